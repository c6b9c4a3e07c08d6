//! Newsletter Subscriber Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterSubscriber {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    /// Lower-cased, unique
    pub email: String,
    #[serde(default = "serde_helpers::default_true")]
    pub is_subscribed: bool,
    pub subscribed_at: i64,
    #[serde(default)]
    pub unsubscribed_at: Option<i64>,
}
