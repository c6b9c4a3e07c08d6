//! Contact Message Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::query::ListQuery;
use crate::db::models::{ContactCreate, ContactMessage, ContactStatus};
use serde::Serialize;
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "contact_message";

#[derive(Debug, Serialize)]
struct ContactInsert {
    name: String,
    email: String,
    subject: String,
    message: String,
    status: ContactStatus,
    created_at: i64,
}

#[derive(Clone)]
pub struct ContactRepository {
    base: BaseRepository,
}

impl ContactRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Listing over this table, refined by the caller
    pub fn list_query() -> ListQuery {
        ListQuery::new(TABLE)
    }

    pub async fn list(&self, query: ListQuery) -> RepoResult<(Vec<ContactMessage>, u64)> {
        query.execute(self.base.db()).await
    }

    pub async fn create(&self, data: ContactCreate) -> RepoResult<ContactMessage> {
        let insert = ContactInsert {
            name: data.name,
            email: data.email,
            subject: data.subject,
            message: data.message,
            status: ContactStatus::New,
            created_at: now_millis(),
        };
        let created: Option<ContactMessage> =
            self.base.db().create(TABLE).content(insert).await?;
        created.ok_or_else(|| RepoError::Database("Failed to save message".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<ContactMessage>> {
        let message: Option<ContactMessage> = self.base.db().select((TABLE, id)).await?;
        Ok(message)
    }

    async fn merge(&self, id: &str, data: serde_json::Value) -> RepoResult<ContactMessage> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("data", data))
            .await?;
        let messages: Vec<ContactMessage> = result.take(0)?;
        messages
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Message {id} not found")))
    }

    /// New messages become read; replied ones stay replied
    pub async fn mark_read(&self, id: &str) -> RepoResult<ContactMessage> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Message {id} not found")))?;
        if existing.status != ContactStatus::New {
            return Ok(existing);
        }
        self.merge(id, serde_json::json!({ "status": "read" })).await
    }

    pub async fn record_reply(&self, id: &str, reply: String) -> RepoResult<ContactMessage> {
        self.merge(
            id,
            serde_json::json!({ "status": "replied", "reply": reply, "replied_at": now_millis() }),
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let deleted: Option<ContactMessage> = self.base.db().delete((TABLE, id)).await?;
        Ok(deleted.is_some())
    }
}
