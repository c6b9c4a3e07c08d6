//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 服务与数据库状态 | 无 |
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "database": "ok", "uptime_seconds": 42 }
//! ```

use std::sync::OnceLock;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::core::ServerState;

static STARTED: OnceLock<Instant> = OnceLock::new();

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    STARTED.get_or_init(Instant::now);
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    /// ok | unreachable
    database: &'static str,
    uptime_seconds: u64,
}

/// GET /health - 数据库不可达时返回 503
async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = state.db.ping().await;
    let uptime_seconds = STARTED.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

    let body = HealthResponse {
        status: if db_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if db_ok { "ok" } else { "unreachable" },
        uptime_seconds,
    };
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
