//! Order Repository
//!
//! Status changes go through compare-and-swap updates guarded by the
//! previous status, so two admins acting on the same order cannot both win.

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::query::ListQuery;
use crate::db::models::{
    Order, OrderCustomer, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};
use serde::Serialize;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "orders";

/// New order row, written once at placement
#[derive(Debug, Clone, Serialize)]
pub struct OrderInsert {
    pub order_number: String,
    pub user_id: String,
    pub customer: OrderCustomer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub total_price: f64,
    pub payment_status: PaymentStatus,
    pub is_paid: bool,
    pub status: OrderStatus,
    pub is_delivered: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Listing over this table, refined by the caller
    pub fn list_query() -> ListQuery {
        ListQuery::new(TABLE)
    }

    pub async fn list(&self, query: ListQuery) -> RepoResult<(Vec<Order>, u64)> {
        query.execute(self.base.db()).await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let order: Option<Order> = self.base.db().select((TABLE, id)).await?;
        Ok(order)
    }

    /// Order numbers starting with `prefix` (e.g. `BOX-2403-`)
    pub async fn numbers_with_prefix(&self, prefix: &str) -> RepoResult<Vec<String>> {
        let numbers: Vec<String> = self
            .base
            .db()
            .query("SELECT VALUE order_number FROM orders WHERE string::starts_with(order_number, $prefix)")
            .bind(("prefix", prefix.to_string()))
            .await?
            .take(0)?;
        Ok(numbers)
    }

    /// Insert a new order; a taken order number yields [`RepoError::Duplicate`]
    pub async fn create(&self, data: OrderInsert) -> RepoResult<Order> {
        let created: Option<Order> = self.base.db().create(TABLE).content(data).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create order".to_string()))
    }

    /// Unconditional merge
    pub async fn merge(&self, id: &str, data: serde_json::Value) -> RepoResult<Order> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("data", data))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        orders
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Order {id} not found")))
    }

    /// Merge only while the payment status is still `expected`
    ///
    /// `None` means another writer changed the status first (or the order is gone).
    pub async fn merge_if_payment_status(
        &self,
        id: &str,
        expected: PaymentStatus,
        data: serde_json::Value,
    ) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data WHERE payment_status = $expected RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("expected", expected.as_str()))
            .bind(("data", data))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    /// Merge only while the fulfillment status is still `expected`
    pub async fn merge_if_status(
        &self,
        id: &str,
        expected: OrderStatus,
        data: serde_json::Value,
    ) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data WHERE status = $expected RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("expected", expected.as_str()))
            .bind(("data", data))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    /// Bank-transfer orders waiting for a receipt review, oldest upload first
    pub async fn find_pending_verification(&self) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query(
                "SELECT * FROM orders WHERE payment_method = 'bankTransfer' \
                 AND payment_status = 'pending_verification' ORDER BY receipt_uploaded_at ASC",
            )
            .await?
            .take(0)?;
        Ok(orders)
    }

    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let deleted: Option<Order> = self.base.db().delete((TABLE, id)).await?;
        Ok(deleted.is_some())
    }
}
