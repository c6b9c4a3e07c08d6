//! Product API 模块
//!
//! 读取接口公开, 写入接口需要管理员。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/products", routes())
}

fn routes() -> Router<ServerState> {
    let public = Router::new()
        .route("/", get(handler::list))
        .route("/featured", get(handler::featured))
        .route("/current-box", get(handler::current_box))
        .route("/{id}", get(handler::get_by_id));

    let admin = Router::new()
        .route("/", post(handler::create))
        .route("/{id}", axum::routing::put(handler::update).delete(handler::delete))
        .route("/{id}/images", post(handler::upload_image))
        .route_layer(middleware::from_fn(require_admin));

    public.merge(admin)
}
