//! Wishlist Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::ApiResponse;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Product, Wishlist};

/// Wishlist with the product documents resolved
#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub user_id: String,
    pub products: Vec<Product>,
    pub updated_at: Option<i64>,
}

/// Resolve product keys; deleted products are skipped
async fn resolve(state: &ServerState, user_id: &str, list: Option<Wishlist>) -> AppResult<WishlistView> {
    let Some(list) = list else {
        return Ok(WishlistView {
            user_id: user_id.to_string(),
            products: Vec::new(),
            updated_at: None,
        });
    };

    let mut products = Vec::with_capacity(list.products.len());
    for key in &list.products {
        if let Some(product) = state.products.find_by_id(key).await? {
            products.push(product);
        }
    }
    Ok(WishlistView {
        user_id: list.user_id,
        products,
        updated_at: Some(list.updated_at),
    })
}

/// GET /api/wishlist - 我的心愿单
pub async fn get_wishlist(
    State(state): State<ServerState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    let list = state.wishlists.find_by_user(&current_user.id).await?;
    let view = resolve(&state, &current_user.id, list).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/wishlist/{product_id} - 加入心愿单 (重复添加无副作用)
pub async fn add(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    if state.products.find_by_id(&product_id).await?.is_none() {
        return Err(AppError::with_message(
            ErrorCode::ProductNotFound,
            format!("Product {product_id} not found"),
        ));
    }
    let list = state.wishlists.add(&current_user.id, &product_id).await?;
    let view = resolve(&state, &current_user.id, Some(list)).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// DELETE /api/wishlist/{product_id} - 移出心愿单
pub async fn remove(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    let list = state.wishlists.remove(&current_user.id, &product_id).await?;
    let view = resolve(&state, &current_user.id, list).await?;
    Ok(Json(ApiResponse::success(view)))
}
