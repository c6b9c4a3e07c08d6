//! Order API Handlers
//!
//! Thin wrappers over [`OrderService`](crate::orders::OrderService); the
//! lifecycle rules live there.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use shared::error::AppResult;
use shared::response::{ApiResponse, ListResponse};

use crate::api::file_response;
use crate::auth::CurrentUser;
use crate::auth::extractor::require_verified;
use crate::core::ServerState;
use crate::db::models::{Order, OrderStatus, PaymentStatus, PlaceOrderRequest};
use crate::db::query::ListParams;
use crate::orders::OrderFilter;
use crate::utils::multipart::read_file_field;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
}

/// POST /api/orders - 下单 (需要已验证邮箱)
pub async fn place(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Json(req): Json<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    require_verified(&current_user)?;
    let order = state.orders.place_order(&current_user, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// GET /api/orders - 全部订单 (?status=&payment_status=&payment_method=&search=&sort=&page=&limit=)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<OrderFilter>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<Order>>> {
    let (orders, total) = state.orders.list(filter, &params).await?;
    Ok(Json(ListResponse::new(
        orders,
        total,
        params.page(),
        params.limit(),
    )))
}

/// GET /api/orders/myorders - 我的订单, 最新在前
pub async fn my_orders(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<Order>>> {
    let filter = OrderFilter {
        user_id: Some(current_user.id),
        ..Default::default()
    };
    let (orders, total) = state.orders.list(filter, &params).await?;
    Ok(Json(ListResponse::new(
        orders,
        total,
        params.page(),
        params.limit(),
    )))
}

/// GET /api/orders/{id} - 订单详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.get_order(&current_user, &id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// PUT /api/orders/{id}/status - 更新履约状态
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.update_status(&id, req.status).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// PUT /api/orders/{id}/payment - 直接设置支付状态
pub async fn update_payment(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state
        .orders
        .update_payment_status(&id, req.payment_status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// PUT /api/orders/{id}/tracking - 设置物流单号
pub async fn set_tracking(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<TrackingRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.set_tracking(&id, &req.tracking_number).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /api/orders/{id}/receipt - 上传转账凭证 (multipart 字段 `receipt`)
pub async fn upload_receipt(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Order>>> {
    // Access check before the body is read
    state.orders.get_order(&current_user, &id).await?;
    let file = read_file_field(&mut multipart, "receipt").await?;
    let order = state
        .orders
        .upload_receipt(&current_user, &id, file)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        order,
        "Receipt uploaded, payment is awaiting verification",
    )))
}

/// GET /api/orders/{id}/receipt - 下载转账凭证
pub async fn download_receipt(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (data, filename) = state.orders.receipt(&current_user, &id).await?;
    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    Ok(file_response(data, mime.as_ref(), Some(&filename)))
}

/// GET /api/orders/{id}/invoice - PDF 发票
pub async fn invoice(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (pdf, filename) = state.orders.invoice(&current_user, &id).await?;
    Ok(file_response(pdf, "application/pdf", Some(&filename)))
}

/// DELETE /api/orders/{id} - 删除订单
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.orders.delete_order(&id).await?;
    Ok(Json(ApiResponse::ok_message("Order deleted")))
}
