//! Database Module
//!
//! Embedded SurrealDB handle and schema bootstrap.
//! The handle is opened once at startup and injected everywhere; there is no
//! degraded mode without a database.

pub mod models;
pub mod query;
pub mod repository;

use shared::error::AppError;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

const NAMESPACE: &str = "boxhub";
const DATABASE: &str = "shop";

/// Tables and unique indexes
///
/// Unique indexes are the last line of defence for values that are checked
/// before insert (emails, order numbers, content keys).
const SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
DEFINE INDEX IF NOT EXISTS user_email ON TABLE user FIELDS email UNIQUE;

DEFINE TABLE IF NOT EXISTS email_otp SCHEMALESS;
DEFINE INDEX IF NOT EXISTS email_otp_target ON TABLE email_otp FIELDS email, purpose UNIQUE;

DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
DEFINE INDEX IF NOT EXISTS product_category ON TABLE product FIELDS category;

DEFINE TABLE IF NOT EXISTS orders SCHEMALESS;
DEFINE INDEX IF NOT EXISTS orders_number ON TABLE orders FIELDS order_number UNIQUE;
DEFINE INDEX IF NOT EXISTS orders_user ON TABLE orders FIELDS user_id;

DEFINE TABLE IF NOT EXISTS wishlist SCHEMALESS;
DEFINE INDEX IF NOT EXISTS wishlist_user ON TABLE wishlist FIELDS user_id UNIQUE;

DEFINE TABLE IF NOT EXISTS newsletter_subscriber SCHEMALESS;
DEFINE INDEX IF NOT EXISTS newsletter_email ON TABLE newsletter_subscriber FIELDS email UNIQUE;

DEFINE TABLE IF NOT EXISTS contact_message SCHEMALESS;

DEFINE TABLE IF NOT EXISTS site_content SCHEMALESS;
DEFINE INDEX IF NOT EXISTS site_content_key ON TABLE site_content FIELDS key UNIQUE;
"#;

/// Database service, owns the SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the RocksDB-backed database at `path`
    pub async fn open(path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        tracing::info!(path = %path, "Database opened (RocksDB)");
        Self::prepare(db).await
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        Self::prepare(db).await
    }

    async fn prepare(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        db.query(SCHEMA)
            .await
            .and_then(|response| response.check())
            .map_err(|e| AppError::database(format!("Failed to apply schema: {e}")))?;
        tracing::info!("Database schema applied");

        Ok(Self { db })
    }

    /// Reachability check for `/health`
    pub async fn ping(&self) -> bool {
        match self.db.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema_is_idempotent() {
        let service = DbService::in_memory().await.unwrap();
        // Re-applying must not fail on existing definitions
        service
            .db
            .query(SCHEMA)
            .await
            .unwrap()
            .check()
            .unwrap();
        assert!(service.ping().await);
    }
}
