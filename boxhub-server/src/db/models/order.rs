//! Order Model
//!
//! Line items freeze the unit price at placement time; the catalog price is
//! never consulted again for an existing order.

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// Fulfillment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Bank-transfer receipt verification status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PendingVerification,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingVerification => "pending_verification",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "bankTransfer",
            Self::CashOnDelivery => "cashOnDelivery",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BankTransfer => "Bank transfer",
            Self::CashOnDelivery => "Cash on delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    /// Island or region
    pub island: String,
    pub postal_code: String,
}

/// Frozen `{product, name, quantity, price}` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product record key
    pub product: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price captured at placement
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
}

/// Name and address the notifications go to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(serialize_with = "serde_helpers::serialize_key")]
    pub id: RecordId,
    /// `<PREFIX>-<YY><MM>-<NNNN>`, immutable
    pub order_number: String,
    /// Owning user record key
    pub user_id: String,
    pub customer: OrderCustomer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub total_price: f64,

    // 支付状态
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub paid_at: Option<i64>,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub receipt_uploaded_at: Option<i64>,
    #[serde(default)]
    pub payment_rejection_reason: Option<String>,

    // 履约状态
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub is_delivered: bool,
    #[serde(default)]
    pub delivered_at: Option<i64>,
    #[serde(default)]
    pub tracking_number: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn key(&self) -> String {
        serde_helpers::record_key(&self.id)
    }
}

/// One requested line of a purchase
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    /// Product record key
    pub product: String,
    pub quantity: i64,
}

/// Purchase request body
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}
