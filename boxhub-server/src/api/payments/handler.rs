//! Payment Verification Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::error::AppResult;
use shared::response::{ApiResponse, ListResponse};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::Order;
use crate::security_log;

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// POST /api/payments/verify/{order_id} - 确认收款
pub async fn verify(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.verify_payment(&order_id).await?;
    security_log!(
        "INFO",
        "payment_verified",
        admin_id = current_user.id.clone(),
        order_number = order.order_number.clone()
    );
    Ok(Json(ApiResponse::success_with_message(
        order,
        "Payment verified",
    )))
}

/// POST /api/payments/reject/{order_id} - 驳回凭证 (可选 `{ "reason": ... }`)
pub async fn reject(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let reason = body.and_then(|Json(req)| req.reason);
    let order = state.orders.reject_payment(&order_id, reason).await?;
    security_log!(
        "INFO",
        "payment_rejected",
        admin_id = current_user.id.clone(),
        order_number = order.order_number.clone()
    );
    Ok(Json(ApiResponse::success_with_message(
        order,
        "Payment rejected",
    )))
}

/// GET /api/payments/pending - 待审核的转账订单, 最早上传在前
pub async fn pending(State(state): State<ServerState>) -> AppResult<Json<ListResponse<Order>>> {
    let orders = state.orders.pending_verifications().await?;
    Ok(Json(ListResponse::all(orders)))
}
