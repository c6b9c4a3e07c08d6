//! Site Content Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::{ApiResponse, ListResponse};

use crate::core::ServerState;
use crate::db::models::{SiteContent, SiteContentUpsert};
use crate::utils::validation::{
    MAX_ADDRESS_LEN, MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, MAX_TEXT_LEN, validate_optional_text,
    validate_required_text,
};

/// Keys are URL slugs: lowercase letters, digits, `-` and `_`
fn validate_key(key: &str) -> AppResult<()> {
    validate_required_text(key, "key", MAX_SHORT_TEXT_LEN)?;
    let valid = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::validation(
            "Content key may only contain lowercase letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

fn content_not_found(key: &str) -> AppError {
    AppError::with_message(ErrorCode::ContentNotFound, format!("Content '{key}' not found"))
}

/// GET /api/content - 全部内容块
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<ListResponse<SiteContent>>> {
    let blocks = state.content.find_all().await?;
    Ok(Json(ListResponse::all(blocks)))
}

/// GET /api/content/{key} - 单个内容块
pub async fn get_by_key(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<SiteContent>>> {
    let block = state
        .content
        .find_by_key(&key)
        .await?
        .ok_or_else(|| content_not_found(&key))?;
    Ok(Json(ApiResponse::success(block)))
}

/// PUT /api/content/{key} - 创建或更新内容块
pub async fn upsert(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(payload): Json<SiteContentUpsert>,
) -> AppResult<Json<ApiResponse<SiteContent>>> {
    validate_key(&key)?;
    validate_required_text(&payload.title, "title", MAX_NAME_LEN)?;
    if payload.body.len() > MAX_TEXT_LEN {
        return Err(AppError::validation(format!(
            "body is too long (max {MAX_TEXT_LEN})"
        )));
    }
    validate_optional_text(&payload.image, "image", MAX_ADDRESS_LEN)?;

    let block = state.content.upsert(&key, payload).await?;
    tracing::info!(key = %key, "Site content saved");
    Ok(Json(ApiResponse::success(block)))
}

/// DELETE /api/content/{key} - 删除内容块
pub async fn delete(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state.content.delete(&key).await? {
        return Err(content_not_found(&key));
    }
    tracing::info!(key = %key, "Site content deleted");
    Ok(Json(ApiResponse::ok_message("Content deleted")))
}
