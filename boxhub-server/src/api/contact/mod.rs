//! Contact API 模块
//!
//! 提交联系表单公开, 其余接口需要管理员。

mod handler;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/contact", routes())
}

fn routes() -> Router<ServerState> {
    let public = Router::new().route("/", post(handler::submit));

    let admin = Router::new()
        .route("/", get(handler::list))
        .route("/{id}/read", put(handler::mark_read))
        .route("/{id}/reply", post(handler::reply))
        .route("/{id}", delete(handler::delete))
        .route_layer(middleware::from_fn(require_admin));

    public.merge(admin)
}
