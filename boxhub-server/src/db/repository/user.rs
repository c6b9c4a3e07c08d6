//! User Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::query::ListQuery;
use crate::db::models::{ShippingAddress, User, UserProfileUpdate, UserRole};
use serde::Serialize;
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "user";

/// New account row
#[derive(Debug, Serialize)]
struct UserInsert {
    name: String,
    email: String,
    password_hash: String,
    role: UserRole,
    is_verified: bool,
    phone: Option<String>,
    address: Option<ShippingAddress>,
    created_at: i64,
    updated_at: i64,
}

/// Fields needed to register an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    /// Already normalized
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
}

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Listing over this table, refined by the caller
    pub fn list_query() -> ListQuery {
        ListQuery::new(TABLE)
    }

    pub async fn list(&self, query: ListQuery) -> RepoResult<(Vec<User>, u64)> {
        query.execute(self.base.db()).await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let user: Option<User> = self.base.db().select((TABLE, id)).await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.to_string()))
            .await?;
        let users: Vec<User> = result.take(0)?;
        Ok(users.into_iter().next())
    }

    pub async fn create(&self, data: NewUser) -> RepoResult<User> {
        if self.find_by_email(&data.email).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Email '{}' is already registered",
                data.email
            )));
        }

        let now = now_millis();
        let insert = UserInsert {
            name: data.name,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
            is_verified: data.is_verified,
            phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        };

        let created: Option<User> = self.base.db().create(TABLE).content(insert).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create user".to_string()))
    }

    async fn merge(&self, id: &str, data: serde_json::Value) -> RepoResult<User> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("data", data))
            .await?;
        let users: Vec<User> = result.take(0)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("User {id} not found")))
    }

    pub async fn mark_verified(&self, id: &str) -> RepoResult<User> {
        self.merge(
            id,
            serde_json::json!({ "is_verified": true, "updated_at": now_millis() }),
        )
        .await
    }

    pub async fn update_password(&self, id: &str, password_hash: String) -> RepoResult<User> {
        self.merge(
            id,
            serde_json::json!({ "password_hash": password_hash, "updated_at": now_millis() }),
        )
        .await
    }

    pub async fn update_profile(&self, id: &str, data: UserProfileUpdate) -> RepoResult<User> {
        let mut value = serde_json::to_value(&data)
            .map_err(|e| RepoError::Validation(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.insert("updated_at".into(), now_millis().into());
        }
        self.merge(id, value).await
    }

    pub async fn update_role(&self, id: &str, role: UserRole) -> RepoResult<User> {
        self.merge(
            id,
            serde_json::json!({ "role": role.as_str(), "updated_at": now_millis() }),
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let deleted: Option<User> = self.base.db().delete((TABLE, id)).await?;
        Ok(deleted.is_some())
    }

    pub async fn count_admins(&self) -> RepoResult<u64> {
        #[derive(serde::Deserialize)]
        struct Count {
            total: u64,
        }
        let mut result = self
            .base
            .db()
            .query("SELECT count() AS total FROM user WHERE role = 'admin' GROUP ALL")
            .await?;
        let counts: Vec<Count> = result.take(0)?;
        Ok(counts.first().map(|c| c.total).unwrap_or(0))
    }
}
