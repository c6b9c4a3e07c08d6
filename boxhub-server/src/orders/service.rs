//! Order Service
//!
//! Placement, fulfillment and payment operations over the `orders` table.
//!
//! # Consistency
//!
//! The database has no multi-document transaction here, so placement works
//! in three passes:
//!
//! ```text
//! validate all lines ──► reserve stock (conditional decrement) ──► insert order
//!                              │ lost race                          │ failed
//!                              └──────── restore reserved stock ◄───┘
//! ```
//!
//! Status changes are compare-and-swap updates keyed on the status that was
//! read, so two admins acting at once cannot both win.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::invoice::render_invoice;
use super::money::{MAX_QUANTITY, line_total, to_f64};
use super::number::{month_prefix, parse_suffix, pick_order_number};
use super::status::{PaymentAction, Transition, fulfillment_transition, paid_fields, payment_transition};
use crate::auth::CurrentUser;
use crate::db::models::{
    Order, OrderCustomer, OrderItem, OrderItemRequest, OrderStatus, PaymentMethod, PaymentStatus,
    PlaceOrderRequest,
};
use crate::db::query::ListParams;
use crate::db::repository::order::OrderInsert;
use crate::db::repository::{OrderRepository, ProductRepository, RepoError};
use crate::services::mailer::{EmailMessage, templates};
use crate::services::notifier::NotificationService;
use crate::services::storage::{FileCategory, FileStorage, UploadedFile};
use crate::utils::validation::{
    MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_address, validate_optional_text,
    validate_required_text,
};

/// Inserts attempted before giving up on a free order number
const NUMBER_ATTEMPTS: usize = 5;

/// Sort fields accepted by order listings
const SORT_FIELDS: &[&str] = &["created_at", "updated_at", "total_price", "order_number"];

/// Admin listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    /// Restrict to one customer; set by the server, never from the query
    #[serde(skip)]
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    products: ProductRepository,
    notifier: NotificationService,
    storage: Arc<dyn FileStorage>,
    number_prefix: String,
    shop_name: String,
}

impl OrderService {
    pub fn new(
        db: Surreal<Db>,
        notifier: NotificationService,
        storage: Arc<dyn FileStorage>,
        number_prefix: impl Into<String>,
        shop_name: impl Into<String>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            products: ProductRepository::new(db),
            notifier,
            storage,
            number_prefix: number_prefix.into(),
            shop_name: shop_name.into(),
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Place an order for `user`
    ///
    /// Either the order exists with its stock reserved, or nothing changed.
    pub async fn place_order(&self, user: &CurrentUser, req: PlaceOrderRequest) -> AppResult<Order> {
        let lines = merge_lines(req.items)?;
        validate_address(&req.shipping_address)?;

        // Pass 1: validate every line and freeze prices
        let mut items = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;
        for (product_id, quantity) in lines {
            let product = self
                .products
                .find_by_id(&product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::ProductNotFound,
                        format!("Product {product_id} not found"),
                    )
                    .with_detail("product", product_id.clone())
                })?;
            if quantity > product.stock {
                return Err(out_of_stock(&product.name, product.stock));
            }
            total += line_total(product.price, quantity);
            items.push(OrderItem {
                product: product_id,
                image: product.images.first().cloned(),
                name: product.name,
                quantity,
                price: product.price,
            });
        }

        // Pass 2: reserve
        let mut reserved: Vec<(String, i64)> = Vec::with_capacity(items.len());
        for item in &items {
            match self.products.reserve_stock(&item.product, item.quantity).await {
                Ok(Some(_)) => reserved.push((item.product.clone(), item.quantity)),
                Ok(None) => {
                    self.release_stock(&reserved).await;
                    let stock = self
                        .products
                        .find_by_id(&item.product)
                        .await
                        .ok()
                        .flatten()
                        .map(|p| p.stock)
                        .unwrap_or(0);
                    return Err(out_of_stock(&item.name, stock));
                }
                Err(e) => {
                    self.release_stock(&reserved).await;
                    return Err(e.into());
                }
            }
        }

        // Pass 3: persist
        let now = now_millis();
        let insert = OrderInsert {
            order_number: String::new(),
            user_id: user.id.clone(),
            customer: OrderCustomer {
                name: user.name.clone(),
                email: user.email.clone(),
            },
            items,
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            total_price: to_f64(total),
            payment_status: PaymentStatus::Pending,
            is_paid: false,
            status: OrderStatus::Pending,
            is_delivered: false,
            created_at: now,
            updated_at: now,
        };

        let order = match self.insert_with_number(insert).await {
            Ok(order) => order,
            Err(e) => {
                self.release_stock(&reserved).await;
                return Err(e);
            }
        };

        tracing::info!(
            order_id = %order.key(),
            order_number = %order.order_number,
            user_id = %order.user_id,
            total = order.total_price,
            items = order.items.len(),
            "Order placed"
        );

        self.notify(&order, "Order confirmation", templates::order_confirmation(&self.shop_name, &order));
        Ok(order)
    }

    /// Insert with a fresh order number, regenerating on a unique-index collision
    async fn insert_with_number(&self, mut insert: OrderInsert) -> AppResult<Order> {
        let prefix = month_prefix(&self.number_prefix, Utc::now());

        for attempt in 1..=NUMBER_ATTEMPTS {
            let used: HashSet<u16> = self
                .orders
                .numbers_with_prefix(&prefix)
                .await?
                .iter()
                .filter_map(|n| parse_suffix(&prefix, n))
                .collect();
            insert.order_number = pick_order_number(&prefix, &used, &mut rand::thread_rng())
                .ok_or_else(|| numbers_exhausted(&prefix))?;

            match self.orders.create(insert.clone()).await {
                Ok(order) => return Ok(order),
                Err(RepoError::Duplicate(_)) => {
                    tracing::warn!(
                        order_number = %insert.order_number,
                        attempt,
                        "Order number taken concurrently, regenerating"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(numbers_exhausted(&prefix))
    }

    /// Compensation: give reserved stock back
    async fn release_stock(&self, reserved: &[(String, i64)]) {
        for (product_id, quantity) in reserved {
            if let Err(e) = self.products.restore_stock(product_id, *quantity).await {
                tracing::error!(
                    product_id = %product_id,
                    quantity,
                    error = %e,
                    "Failed to restore reserved stock"
                );
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn find(&self, id: &str) -> AppResult<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::with_message(ErrorCode::OrderNotFound, format!("Order {id} not found")))
    }

    /// Fetch an order the caller owns (admins see every order)
    pub async fn get_order(&self, user: &CurrentUser, id: &str) -> AppResult<Order> {
        let order = self.find(id).await?;
        if !user.can_access(&order.user_id) {
            crate::security_log!(
                "WARN",
                "order_access_denied",
                user_id = user.id.clone(),
                order_id = id.to_string()
            );
            return Err(AppError::new(ErrorCode::NotResourceOwner));
        }
        Ok(order)
    }

    pub async fn list(&self, filter: OrderFilter, params: &ListParams) -> AppResult<(Vec<Order>, u64)> {
        let mut query = OrderRepository::list_query();
        if let Some(user_id) = filter.user_id {
            query = query.filter_eq("user_id", user_id);
        }
        if let Some(status) = filter.status {
            query = query.filter_eq("status", status.as_str());
        }
        if let Some(status) = filter.payment_status {
            query = query.filter_eq("payment_status", status.as_str());
        }
        if let Some(method) = filter.payment_method {
            query = query.filter_eq("payment_method", method.as_str());
        }
        let query = query
            .search(
                &["order_number", "customer.name", "customer.email"],
                params.search.as_deref(),
            )
            .sort(params.sort.as_deref(), SORT_FIELDS, "created_at DESC")
            .page(params.page(), params.limit());
        Ok(self.orders.list(query).await?)
    }

    /// Bank-transfer orders waiting on an admin, oldest receipt first
    pub async fn pending_verifications(&self) -> AppResult<Vec<Order>> {
        Ok(self.orders.find_pending_verification().await?)
    }

    // ========================================================================
    // Fulfillment
    // ========================================================================

    pub async fn update_status(&self, id: &str, target: OrderStatus) -> AppResult<Order> {
        let order = self.find(id).await?;
        let next = match fulfillment_transition(order.status, target)? {
            Transition::Unchanged => return Ok(order),
            Transition::To(next) => next,
        };

        let now = now_millis();
        let mut data = json!({
            "status": next.as_str(),
            "updated_at": now,
        });
        if next == OrderStatus::Delivered {
            data["is_delivered"] = Value::Bool(true);
            data["delivered_at"] = now.into();
        }

        let updated = self
            .orders
            .merge_if_status(id, order.status, data)
            .await?
            .ok_or_else(|| concurrent_change(ErrorCode::InvalidStatusTransition))?;

        tracing::info!(
            order_number = %updated.order_number,
            from = order.status.as_str(),
            to = next.as_str(),
            "Order status changed"
        );
        self.notify(
            &updated,
            &format!("Order {} update", updated.order_number),
            templates::order_status_update(&self.shop_name, &updated),
        );
        Ok(updated)
    }

    pub async fn set_tracking(&self, id: &str, tracking_number: &str) -> AppResult<Order> {
        let tracking_number = tracking_number.trim();
        validate_required_text(tracking_number, "tracking_number", MAX_SHORT_TEXT_LEN)?;
        self.find(id).await?;

        let updated = self
            .orders
            .merge(
                id,
                json!({ "tracking_number": tracking_number, "updated_at": now_millis() }),
            )
            .await?;
        tracing::info!(order_number = %updated.order_number, tracking = %tracking_number, "Tracking number set");
        Ok(updated)
    }

    /// Admin delete; the receipt file goes with the order
    pub async fn delete_order(&self, id: &str) -> AppResult<()> {
        let order = self.find(id).await?;
        if !self.orders.delete(id).await? {
            return Err(AppError::with_message(ErrorCode::OrderNotFound, format!("Order {id} not found")));
        }
        if let Some(receipt) = &order.receipt {
            self.remove_file(receipt).await;
        }
        tracing::info!(order_number = %order.order_number, "Order deleted");
        Ok(())
    }

    // ========================================================================
    // Payment
    // ========================================================================

    /// Admin override of the payment status; no receipt needed
    pub async fn update_payment_status(&self, id: &str, status: PaymentStatus) -> AppResult<Order> {
        let order = self.find(id).await?;
        let next = payment_transition(order.payment_status, PaymentAction::Set(status))?;
        let now = now_millis();
        let (is_paid, paid_at) = paid_fields(next, order.paid_at, now);

        let mut data = json!({
            "payment_status": next.as_str(),
            "is_paid": is_paid,
            "paid_at": paid_at,
            "updated_at": now,
        });
        if next == PaymentStatus::Verified {
            data["payment_rejection_reason"] = Value::Null;
        }

        let updated = self
            .orders
            .merge_if_payment_status(id, order.payment_status, data)
            .await?
            .ok_or_else(|| concurrent_change(ErrorCode::InvalidPaymentTransition))?;

        tracing::info!(
            order_number = %updated.order_number,
            from = order.payment_status.as_str(),
            to = next.as_str(),
            "Payment status set"
        );
        if next == PaymentStatus::Verified && order.payment_status != PaymentStatus::Verified {
            self.notify(
                &updated,
                &format!("Payment received for {}", updated.order_number),
                templates::payment_verified(&self.shop_name, &updated),
            );
        }
        Ok(updated)
    }

    /// Attach a bank-transfer receipt and move the payment to verification
    pub async fn upload_receipt(
        &self,
        user: &CurrentUser,
        id: &str,
        file: Option<UploadedFile>,
    ) -> AppResult<Order> {
        let order = self.get_order(user, id).await?;
        let file = file.ok_or_else(|| {
            AppError::with_message(ErrorCode::NoFileProvided, "No receipt file uploaded")
        })?;
        if order.payment_method != PaymentMethod::BankTransfer {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                "Receipts are only accepted for bank transfer orders",
            ));
        }
        let next = payment_transition(order.payment_status, PaymentAction::UploadReceipt)?;

        let stored = self.storage.store(FileCategory::Receipts, file).await?;
        let now = now_millis();
        let data = json!({
            "receipt": stored.reference,
            "receipt_uploaded_at": now,
            "payment_status": next.as_str(),
            "is_paid": false,
            "paid_at": Value::Null,
            "updated_at": now,
        });

        let updated = match self
            .orders
            .merge_if_payment_status(id, order.payment_status, data)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.remove_file(&stored.reference).await;
                return Err(concurrent_change(ErrorCode::InvalidPaymentTransition));
            }
            Err(e) => {
                self.remove_file(&stored.reference).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            order_number = %updated.order_number,
            receipt = %stored.reference,
            size = stored.size,
            "Payment receipt uploaded"
        );
        Ok(updated)
    }

    pub async fn verify_payment(&self, id: &str) -> AppResult<Order> {
        let order = self.find(id).await?;
        if order.payment_status != PaymentStatus::Verified && order.receipt.is_none() {
            return Err(AppError::new(ErrorCode::ReceiptRequired));
        }
        let next = payment_transition(order.payment_status, PaymentAction::Verify)?;
        let now = now_millis();
        let (is_paid, paid_at) = paid_fields(next, order.paid_at, now);

        let updated = self
            .orders
            .merge_if_payment_status(
                id,
                order.payment_status,
                json!({
                    "payment_status": next.as_str(),
                    "is_paid": is_paid,
                    "paid_at": paid_at,
                    "payment_rejection_reason": Value::Null,
                    "updated_at": now,
                }),
            )
            .await?
            .ok_or_else(|| concurrent_change(ErrorCode::InvalidPaymentTransition))?;

        tracing::info!(order_number = %updated.order_number, total = updated.total_price, "Payment verified");
        self.notify(
            &updated,
            &format!("Payment received for {}", updated.order_number),
            templates::payment_verified(&self.shop_name, &updated),
        );
        Ok(updated)
    }

    /// Refuse the receipt; the stored file is deleted once the order no longer points at it
    pub async fn reject_payment(&self, id: &str, reason: Option<String>) -> AppResult<Order> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        validate_optional_text(&reason, "reason", MAX_NOTE_LEN)?;

        let order = self.find(id).await?;
        let receipt = order
            .receipt
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::ReceiptRequired))?;
        let next = payment_transition(order.payment_status, PaymentAction::Reject)?;
        let now = now_millis();
        let (is_paid, paid_at) = paid_fields(next, order.paid_at, now);

        let updated = self
            .orders
            .merge_if_payment_status(
                id,
                order.payment_status,
                json!({
                    "payment_status": next.as_str(),
                    "is_paid": is_paid,
                    "paid_at": paid_at,
                    "receipt": Value::Null,
                    "receipt_uploaded_at": Value::Null,
                    "payment_rejection_reason": reason,
                    "updated_at": now,
                }),
            )
            .await?
            .ok_or_else(|| concurrent_change(ErrorCode::InvalidPaymentTransition))?;

        self.remove_file(&receipt).await;

        tracing::info!(
            order_number = %updated.order_number,
            reason = ?updated.payment_rejection_reason,
            "Payment rejected"
        );
        self.notify(
            &updated,
            &format!("Payment issue with {}", updated.order_number),
            templates::payment_rejected(&self.shop_name, &updated),
        );
        Ok(updated)
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// PDF invoice and its download file name
    pub async fn invoice(&self, user: &CurrentUser, id: &str) -> AppResult<(Vec<u8>, String)> {
        let order = self.get_order(user, id).await?;
        let pdf = render_invoice(&order, &self.shop_name)?;
        Ok((pdf, format!("invoice-{}.pdf", order.order_number)))
    }

    /// Stored receipt bytes and a download file name
    pub async fn receipt(&self, user: &CurrentUser, id: &str) -> AppResult<(Vec<u8>, String)> {
        let order = self.get_order(user, id).await?;
        let reference = order
            .receipt
            .ok_or_else(|| AppError::not_found(format!("Receipt for order {}", order.order_number)))?;
        let data = self.storage.read(&reference).await?;
        let ext = reference.rsplit_once('.').map(|(_, e)| e).unwrap_or("bin");
        Ok((data, format!("receipt-{}.{ext}", order.order_number)))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn notify(&self, order: &Order, subject: &str, body: (String, String)) {
        self.notifier
            .enqueue(EmailMessage::new(order.customer.email.clone(), subject, body));
    }

    async fn remove_file(&self, reference: &str) {
        if let Err(e) = self.storage.delete(reference).await {
            tracing::warn!(reference = %reference, error = %e, "Failed to delete stored file");
        }
    }
}

/// Validate requested lines and merge repeated products, keeping first-seen order
fn merge_lines(items: Vec<OrderItemRequest>) -> AppResult<Vec<(String, i64)>> {
    if items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }

    let mut lines: Vec<(String, i64)> = Vec::with_capacity(items.len());
    for item in items {
        let product = item.product.trim();
        if product.is_empty() {
            return Err(AppError::with_message(ErrorCode::RequiredField, "Product id is required"));
        }
        if item.quantity <= 0 {
            return Err(AppError::validation(format!(
                "Quantity for product {product} must be at least 1"
            ))
            .with_detail("product", product.to_string()));
        }
        if item.quantity > MAX_QUANTITY {
            return Err(quantity_too_large(product));
        }
        match lines.iter_mut().find(|(id, _)| id == product) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .filter(|q| *q <= MAX_QUANTITY)
                    .ok_or_else(|| quantity_too_large(product))?;
            }
            None => lines.push((product.to_string(), item.quantity)),
        }
    }
    Ok(lines)
}

fn quantity_too_large(product: &str) -> AppError {
    AppError::validation(format!("Quantity for product {product} exceeds {MAX_QUANTITY}"))
        .with_detail("product", product.to_string())
}

fn out_of_stock(name: &str, available: i64) -> AppError {
    AppError::with_message(
        ErrorCode::ProductOutOfStock,
        format!("Insufficient stock for {name} (available: {available})"),
    )
    .with_detail("product", name.to_string())
}

fn numbers_exhausted(prefix: &str) -> AppError {
    AppError::with_message(
        ErrorCode::OrderNumberExhausted,
        format!("No order numbers left for {prefix}xxxx"),
    )
}

fn concurrent_change(code: ErrorCode) -> AppError {
    AppError::with_message(code, "Order was changed by another request, reload and retry")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, quantity: i64) -> OrderItemRequest {
        OrderItemRequest {
            product: product.into(),
            quantity,
        }
    }

    #[test]
    fn test_merge_lines_sums_duplicates_in_order() {
        let lines = merge_lines(vec![line("b", 1), line("a", 2), line("b", 3)]).unwrap();
        assert_eq!(lines, vec![("b".to_string(), 4), ("a".to_string(), 2)]);
    }

    #[test]
    fn test_merge_lines_rejects_bad_input() {
        assert_eq!(merge_lines(vec![]).unwrap_err().code, ErrorCode::OrderEmpty);
        assert_eq!(
            merge_lines(vec![line("a", 0)]).unwrap_err().code,
            ErrorCode::ValidationFailed
        );
        assert_eq!(
            merge_lines(vec![line("a", -2)]).unwrap_err().code,
            ErrorCode::ValidationFailed
        );
        assert_eq!(
            merge_lines(vec![line(" ", 1)]).unwrap_err().code,
            ErrorCode::RequiredField
        );
        assert!(merge_lines(vec![line("a", MAX_QUANTITY), line("a", 1)]).is_err());
    }

    #[test]
    fn test_merge_lines_rejects_overflowing_quantities() {
        let err = merge_lines(vec![line("a", i64::MAX), line("a", i64::MAX)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let err = merge_lines(vec![line("a", MAX_QUANTITY + 1)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let err = merge_lines(vec![line("a", 1), line("a", i64::MAX)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
