//! Payment API 模块 (管理员)
//!
//! 银行转账凭证审核。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/verify/{order_id}", post(handler::verify))
        .route("/reject/{order_id}", post(handler::reject))
        .route("/pending", get(handler::pending))
        .route_layer(middleware::from_fn(require_admin))
}
