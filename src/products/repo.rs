use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product};
use crate::store::PgStore;

/// Resource store for products. Every method is a single statement.
#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product>;

    async fn list(&self) -> anyhow::Result<Vec<Product>>;

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>>;

    /// Writes the mutable fields of `product`. `None` if the row is gone.
    async fn update(&self, product: &Product) -> anyhow::Result<Option<Product>>;

    /// Number of rows removed (0 or 1).
    async fn delete(&self, id: Uuid) -> anyhow::Result<u64>;
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price, stock, owner_id)
            VALUES ($1, $2, $3, $4::numeric(12, 2), $5, $6)
            RETURNING id, name, description, price::float8 AS price, stock, owner_id,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(new.owner_id)
        .fetch_one(&self.pool)
        .await
        .context("insert product")?;
        Ok(product)
    }

    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price::float8 AS price, stock, owner_id,
                   created_at, updated_at
              FROM products
             ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list products")?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price::float8 AS price, stock, owner_id,
                   created_at, updated_at
              FROM products
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find product")?;
        Ok(row)
    }

    async fn update(&self, product: &Product) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = $2,
                   description = $3,
                   price = $4::numeric(12, 2),
                   stock = $5,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, description, price::float8 AS price, stock, owner_id,
                      created_at, updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .fetch_optional(&self.pool)
        .await
        .context("update product")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete product")?;
        Ok(res.rows_affected())
    }
}
