//! In-process store used by `AppState::fake()` and the test suites.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::HealthCheck;
use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{NewUser, Role, User},
    },
    error::AppError,
    products::{
        repo::ProductRepo,
        repo_types::{NewProduct, Product},
    },
};

pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    products: RwLock<Vec<Product>>,
    healthy: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            products: RwLock::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `ping` fail, as if the database went away.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            anyhow::bail!("memory store marked unhealthy")
        }
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(AppError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product> {
        let owner_exists = self.users.read().await.iter().any(|u| u.id == new.owner_id);
        anyhow::ensure!(owner_exists, "owner {} does not exist", new.owner_id);

        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price: round_cents(new.price),
            stock: new.stock,
            owner_id: new.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn update(&self, product: &Product) -> anyhow::Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|p| p.id == product.id).map(|p| {
            p.name = product.name.clone();
            p.description = product.description.clone();
            p.price = round_cents(product.price);
            p.stock = product.stock;
            p.updated_at = OffsetDateTime::now_utc();
            p.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<u64> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok((before - products.len()) as u64)
    }
}
