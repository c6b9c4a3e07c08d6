//! Contact Message Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use validator::Validate;

use super::serde_helpers;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Read,
    Replied,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Read => "read",
            Self::Replied => "replied",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub replied_at: Option<i64>,
    pub created_at: i64,
}

impl ContactMessage {
    pub fn key(&self) -> String {
        serde_helpers::record_key(&self.id)
    }
}

/// Public contact form payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactCreate {
    #[validate(length(min = 1, max = 200, message = "Name is required (max 200 characters)"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Subject is required (max 200 characters)"))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000, message = "Message is required (max 10000 characters)"))]
    pub message: String,
}
