//! User Management Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::{ApiResponse, ListResponse};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{User, UserRole};
use crate::db::query::ListParams;
use crate::db::repository::UserRepository;
use crate::security_log;

const SORT_FIELDS: &[&str] = &["created_at", "name", "email"];

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

async fn load_user(state: &ServerState, id: &str) -> AppResult<User> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))
}

/// Refuse changes that would leave the shop without an administrator
async fn ensure_not_last_admin(state: &ServerState, target: &User) -> AppResult<()> {
    if target.role == UserRole::Admin && state.users.count_admins().await? <= 1 {
        return Err(AppError::with_message(
            ErrorCode::InvalidRequest,
            "Cannot remove the last administrator",
        ));
    }
    Ok(())
}

/// GET /api/users - 用户列表 (?role=&search=&sort=&page=&limit=)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<UserFilter>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<User>>> {
    let mut query = UserRepository::list_query();
    if let Some(role) = filter.role {
        query = query.filter_eq("role", role.as_str());
    }
    let query = query
        .search(&["name", "email"], params.search.as_deref())
        .sort(params.sort.as_deref(), SORT_FIELDS, "created_at DESC")
        .page(params.page(), params.limit());

    let (users, total) = state.users.list(query).await?;
    Ok(Json(ListResponse::new(
        users,
        total,
        params.page(),
        params.limit(),
    )))
}

/// PUT /api/users/{id}/role - 修改用户角色
pub async fn update_role(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    if id == current_user.id {
        return Err(AppError::new(ErrorCode::UserCannotModifySelf));
    }
    let target = load_user(&state, &id).await?;
    if target.role == req.role {
        return Ok(Json(ApiResponse::success(target)));
    }
    if req.role == UserRole::User {
        ensure_not_last_admin(&state, &target).await?;
    }

    let user = state.users.update_role(&id, req.role).await?;
    security_log!(
        "INFO",
        "role_changed",
        admin_id = current_user.id.clone(),
        user_id = id.clone(),
        role = req.role.as_str()
    );
    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /api/users/{id} - 删除用户
pub async fn delete(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    if id == current_user.id {
        return Err(AppError::new(ErrorCode::UserCannotModifySelf));
    }
    let target = load_user(&state, &id).await?;
    ensure_not_last_admin(&state, &target).await?;

    if !state.users.delete(&id).await? {
        return Err(AppError::new(ErrorCode::UserNotFound));
    }
    // Wishlists go with the account; orders stay for bookkeeping
    if let Err(e) = state.wishlists.delete_for_user(&id).await {
        tracing::warn!(user_id = %id, error = %e, "Failed to delete wishlist of removed user");
    }
    security_log!(
        "INFO",
        "user_deleted",
        admin_id = current_user.id.clone(),
        user_id = id.clone()
    );
    Ok(Json(ApiResponse::ok_message("User deleted")))
}
