//! Wishlist API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/wishlist", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::get_wishlist))
        .route(
            "/{product_id}",
            post(handler::add).delete(handler::remove),
        )
}
