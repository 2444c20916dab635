//! Narrow contracts to the identity and catalog collaborators.
//!
//! The messaging core never owns user accounts or catalog items; it only
//! asks whether a referenced entity exists. The SQL-backed implementations
//! read the collaborator tables directly, and tests can substitute stubs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppResult;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn item_exists(&self, item_ref: i64) -> AppResult<bool>;
}

pub struct SqlUserDirectory {
    pool: DbPool,
}

impl SqlUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqlUserDirectory {
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

pub struct SqlItemCatalog {
    pool: DbPool,
}

impl SqlItemCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemCatalog for SqlItemCatalog {
    async fn item_exists(&self, item_ref: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM items WHERE id = ?1)",
        )
        .bind(item_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
