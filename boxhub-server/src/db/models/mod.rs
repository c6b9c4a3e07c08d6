//! Database Models

// Serde helpers
pub mod serde_helpers;

// Accounts
pub mod email_otp;
pub mod user;

// Catalog
pub mod product;

// Orders
pub mod order;

// Engagement
pub mod contact;
pub mod content;
pub mod newsletter;
pub mod wishlist;

// Re-exports
pub use contact::{ContactCreate, ContactMessage, ContactStatus};
pub use content::{SiteContent, SiteContentUpsert};
pub use email_otp::{EmailOtp, OtpPurpose};
pub use newsletter::NewsletterSubscriber;
pub use order::{
    Order, OrderCustomer, OrderItem, OrderItemRequest, OrderStatus, PaymentMethod, PaymentStatus,
    PlaceOrderRequest, ShippingAddress,
};
pub use product::{Product, ProductCreate, ProductUpdate};
pub use user::{User, UserProfileUpdate, UserRole};
pub use wishlist::Wishlist;
