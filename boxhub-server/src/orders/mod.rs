//! Order lifecycle
//!
//! - [`service`]: placement, fulfillment and payment operations
//! - [`status`]: fulfillment and payment state machines
//! - [`number`]: human-readable order numbers
//! - [`money`]: decimal arithmetic for totals
//! - [`invoice`]: PDF invoices

pub mod invoice;
pub mod money;
pub mod number;
pub mod service;
pub mod status;

pub use service::{OrderFilter, OrderService};
pub use status::{PaymentAction, Transition};
