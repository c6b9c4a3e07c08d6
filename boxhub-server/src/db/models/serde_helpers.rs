//! Common serde helpers for SurrealDB records
//!
//! Records are read with their native `RecordId`, and answered to API
//! clients with the bare record key (`product:abc` → `"abc"`).

use serde::Serializer;
use surrealdb::RecordId;

/// Record key without table prefix or escaping brackets
pub fn record_key(id: &RecordId) -> String {
    let raw = id.key().to_string();
    raw.trim_start_matches('⟨')
        .trim_end_matches('⟩')
        .trim_matches('`')
        .to_string()
}

/// Serialize a `RecordId` as its bare key
pub fn serialize_key<S>(id: &RecordId, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&record_key(id))
}

pub fn default_true() -> bool {
    true
}
