//! Shared types for BoxHub
//!
//! Error codes, the response envelopes every endpoint answers with, and
//! small utilities used by the server and its tests.

pub mod error;
pub mod response;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use http;
pub use response::{ApiResponse, ErrorBody, ListResponse, Pagination};
pub use serde::{Deserialize, Serialize};
