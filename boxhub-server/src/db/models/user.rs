//! User Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::order::ShippingAddress;
use super::serde_helpers;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Customer or administrator account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    pub name: String,
    /// Lower-cased, unique
    pub email: String,
    /// Argon2 hash, never serialized to clients
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub phone: Option<String>,
    /// Default shipping address
    #[serde(default)]
    pub address: Option<ShippingAddress>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn key(&self) -> String {
        serde_helpers::record_key(&self.id)
    }
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<ShippingAddress>,
}
