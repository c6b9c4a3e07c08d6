//! Newsletter API 模块

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/newsletter", routes())
}

fn routes() -> Router<ServerState> {
    let public = Router::new()
        .route("/subscribe", post(handler::subscribe))
        .route("/unsubscribe", post(handler::unsubscribe));

    let admin = Router::new()
        .route("/subscribers", get(handler::list))
        .route_layer(middleware::from_fn(require_admin));

    public.merge(admin)
}
