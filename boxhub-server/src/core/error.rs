//! Startup and server-level errors
//!
//! Request handlers use [`shared::error::AppError`]; these cover the
//! process edge: configuration, storage and the listener.

use shared::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(#[source] AppError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
