//! Newsletter Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::{ApiResponse, ListResponse};
use shared::util::normalize_email;
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::NewsletterSubscriber;
use crate::db::query::ListParams;
use crate::db::repository::NewsletterRepository;
use crate::utils::validation::validate_payload;

const SORT_FIELDS: &[&str] = &["subscribed_at", "email"];

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberFilter {
    pub subscribed: Option<bool>,
}

/// POST /api/newsletter/subscribe - 订阅 (重复订阅幂等)
pub async fn subscribe(
    State(state): State<ServerState>,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<Json<ApiResponse<NewsletterSubscriber>>> {
    validate_payload(&req)?;
    let email = normalize_email(&req.email);
    let subscriber = state.newsletter.subscribe(&email).await?;
    tracing::info!(email = %email, "Newsletter subscription");
    Ok(Json(ApiResponse::success_with_message(
        subscriber,
        "Subscribed to the newsletter",
    )))
}

/// POST /api/newsletter/unsubscribe - 退订
pub async fn unsubscribe(
    State(state): State<ServerState>,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    validate_payload(&req)?;
    let email = normalize_email(&req.email);
    if state.newsletter.unsubscribe(&email).await?.is_none() {
        return Err(AppError::new(ErrorCode::SubscriberNotFound));
    }
    tracing::info!(email = %email, "Newsletter unsubscription");
    Ok(Json(ApiResponse::ok_message("Unsubscribed from the newsletter")))
}

/// GET /api/newsletter/subscribers - 订阅者列表 (?subscribed=&search=&page=&limit=)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<SubscriberFilter>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<NewsletterSubscriber>>> {
    let mut query = NewsletterRepository::list_query();
    if let Some(subscribed) = filter.subscribed {
        query = query.filter_eq("is_subscribed", subscribed);
    }
    let query = query
        .search(&["email"], params.search.as_deref())
        .sort(params.sort.as_deref(), SORT_FIELDS, "subscribed_at DESC")
        .page(params.page(), params.limit());

    let (subscribers, total) = state.newsletter.list(query).await?;
    Ok(Json(ListResponse::new(
        subscribers,
        total,
        params.page(),
        params.limit(),
    )))
}
