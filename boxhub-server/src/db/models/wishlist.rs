//! Wishlist Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// One wishlist per user, product keys kept unique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wishlist {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    pub user_id: String,
    #[serde(default)]
    pub products: Vec<String>,
    pub updated_at: i64,
}
