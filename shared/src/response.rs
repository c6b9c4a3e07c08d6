//! API Response types
//!
//! Every endpoint answers with one of these envelopes:
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": true, "count": 10, "total": 42, "pagination": { ... }, "data": [ ... ] }
//! { "success": false, "error": "Order not found", "code": 4001 }
//! ```

use serde::{Deserialize, Serialize};

/// Success envelope for single resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// 创建带提示信息的成功响应
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    /// Success without payload
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Failure envelope, produced by `AppError`'s `IntoResponse`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: u16,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page number (1-based)
    pub page: u32,
    /// Items per page
    pub limit: u32,
    /// Total number of pages
    pub pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit)) as u32
        };
        Self {
            page,
            limit,
            pages,
            next: (page < pages).then_some(page + 1),
            prev: (page > 1).then(|| page - 1),
        }
    }
}

/// Success envelope for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub success: bool,
    /// Items in this page
    pub count: usize,
    /// Items matching the query across all pages
    pub total: u64,
    pub pagination: Pagination,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        Self {
            success: true,
            count: data.len(),
            total,
            pagination: Pagination::new(page, limit, total),
            data,
        }
    }

    /// Unpaginated list (everything fits on one page)
    pub fn all(data: Vec<T>) -> Self {
        let total = data.len() as u64;
        let limit = data.len().max(1) as u32;
        Self::new(data, total, 1, limit)
    }
}
