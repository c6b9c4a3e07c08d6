//! Product Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// Catalog product
///
/// `stock` is only decreased by order placement and only increased by admin
/// edits or by compensation when a placement fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub stock: i64,
    #[serde(default)]
    pub category: String,
    /// Stored file URLs
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    /// The active month's subscription box, at most one product
    #[serde(default)]
    pub is_current_box: bool,
    #[serde(default = "serde_helpers::default_true")]
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    pub fn key(&self) -> String {
        serde_helpers::record_key(&self.id)
    }
}

/// Create product payload
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_current_box: Option<bool>,
    pub is_active: Option<bool>,
}

/// Update product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current_box: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}
