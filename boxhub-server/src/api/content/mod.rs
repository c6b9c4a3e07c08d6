//! Site Content API 模块

mod handler;

use axum::{Router, middleware, routing::get};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/content", routes())
}

fn routes() -> Router<ServerState> {
    let public = Router::new()
        .route("/", get(handler::list))
        .route("/{key}", get(handler::get_by_key));

    let admin = Router::new()
        .route(
            "/{key}",
            axum::routing::put(handler::upsert).delete(handler::delete),
        )
        .route_layer(middleware::from_fn(require_admin));

    public.merge(admin)
}
