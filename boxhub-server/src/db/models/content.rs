//! Site Content Model
//!
//! Admin-editable blocks addressed by a unique key (`about`, `faq`, `shipping`, ...).

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteContent {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteContentUpsert {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image: Option<String>,
}
