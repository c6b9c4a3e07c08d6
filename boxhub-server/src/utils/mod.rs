//! 工具模块
//!
//! - [`logger`] - tracing 初始化与日志清理
//! - [`validation`] - 输入校验
//! - [`multipart`] - 上传表单读取

pub mod logger;
pub mod multipart;
pub mod validation;

pub use shared::error::{AppError, AppResult, ErrorCode};
