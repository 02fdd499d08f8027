use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, Role, User},
    error::AppError,
    store::{is_unique_violation, PgStore},
};

/// Credential store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// `email` must already be lower-cased.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Fails with `AppError::DuplicateEmail` when the email is taken.
    async fn create(&self, new: NewUser) -> Result<User, AppError>;

    async fn list(&self) -> anyhow::Result<Vec<User>>;

    /// Returns `None` when no such user exists.
    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, AppError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(user) => Ok(user),
            // lost a race with a concurrent registration
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEmail),
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET role = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .context("update user role")?;
        Ok(user)
    }
}
