//! User Management API 模块 (管理员)

mod handler;

use axum::{
    Router, middleware,
    routing::{delete, get, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/users", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}/role", put(handler::update_role))
        .route("/{id}", delete(handler::delete))
        .route_layer(middleware::from_fn(require_admin))
}
