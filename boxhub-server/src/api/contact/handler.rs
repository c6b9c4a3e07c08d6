//! Contact Message Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::{ApiResponse, ListResponse};
use shared::util::normalize_email;

use crate::core::ServerState;
use crate::db::models::{ContactCreate, ContactMessage, ContactStatus};
use crate::db::query::ListParams;
use crate::db::repository::ContactRepository;
use crate::services::mailer::{EmailMessage, templates};
use crate::utils::validation::{MAX_NOTE_LEN, validate_payload, validate_required_text};

const SORT_FIELDS: &[&str] = &["created_at", "status"];

#[derive(Debug, Default, Deserialize)]
pub struct ContactFilter {
    pub status: Option<ContactStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

async fn load_message(state: &ServerState, id: &str) -> AppResult<ContactMessage> {
    state
        .contacts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ContactMessageNotFound))
}

/// POST /api/contact - 提交联系表单
pub async fn submit(
    State(state): State<ServerState>,
    Json(mut payload): Json<ContactCreate>,
) -> AppResult<(StatusCode, Json<ApiResponse<ContactMessage>>)> {
    payload.name = payload.name.trim().to_string();
    payload.subject = payload.subject.trim().to_string();
    payload.email = normalize_email(&payload.email);
    validate_payload(&payload)?;

    let message = state.contacts.create(payload).await?;
    tracing::info!(message_id = %message.key(), "Contact message received");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            message,
            "Thank you, we will get back to you soon",
        )),
    ))
}

/// GET /api/contact - 联系消息列表 (?status=&search=&page=&limit=)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<ContactFilter>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<ContactMessage>>> {
    let mut query = ContactRepository::list_query();
    if let Some(status) = filter.status {
        query = query.filter_eq("status", status.as_str());
    }
    let query = query
        .search(&["name", "email", "subject"], params.search.as_deref())
        .sort(params.sort.as_deref(), SORT_FIELDS, "created_at DESC")
        .page(params.page(), params.limit());

    let (messages, total) = state.contacts.list(query).await?;
    Ok(Json(ListResponse::new(
        messages,
        total,
        params.page(),
        params.limit(),
    )))
}

/// PUT /api/contact/{id}/read - 标记已读
pub async fn mark_read(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ContactMessage>>> {
    load_message(&state, &id).await?;
    let message = state.contacts.mark_read(&id).await?;
    Ok(Json(ApiResponse::success(message)))
}

/// POST /api/contact/{id}/reply - 邮件回复
///
/// The reply is saved first; the email is queued and its delivery never
/// fails the request.
pub async fn reply(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> AppResult<Json<ApiResponse<ContactMessage>>> {
    let reply = req.reply.trim().to_string();
    validate_required_text(&reply, "reply", MAX_NOTE_LEN)?;
    load_message(&state, &id).await?;

    let message = state.contacts.record_reply(&id, reply.clone()).await?;
    state.notify(EmailMessage::new(
        &message.email,
        format!("Re: {}", message.subject),
        templates::contact_reply(state.shop_name(), &message.name, &message.subject, &reply),
    ));
    tracing::info!(message_id = %id, "Contact message replied");

    Ok(Json(ApiResponse::success_with_message(message, "Reply sent")))
}

/// DELETE /api/contact/{id} - 删除消息
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state.contacts.delete(&id).await? {
        return Err(AppError::new(ErrorCode::ContactMessageNotFound));
    }
    Ok(Json(ApiResponse::ok_message("Message deleted")))
}
