//! Unified error codes for BoxHub
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product and file errors
//! - 7xxx: Customer engagement (wishlist, newsletter, contact, content)
//! - 8xxx: User errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as its numeric value so clients can switch on it without
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Too many requests from one client
    RateLimited = 9,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (email/password)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Verification code expired
    VerificationCodeExpired = 1011,
    /// Verification code invalid
    VerificationCodeInvalid = 1012,
    /// Too many verification attempts
    TooManyAttempts = 1013,
    /// Password too short
    PasswordTooShort = 1014,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2003,
    /// Caller does not own the resource
    NotResourceOwner = 2006,
    /// Email not verified
    EmailNotVerified = 2007,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is empty
    OrderEmpty = 4007,
    /// Fulfillment status transition not allowed
    InvalidStatusTransition = 4010,
    /// No free order numbers left for the month
    OrderNumberExhausted = 4011,
    /// Invalid shipping address
    InvalidShippingAddress = 4012,

    // ==================== 5xxx: Payment ====================
    /// Payment method does not support the operation
    PaymentInvalidMethod = 5003,
    /// Payment status transition not allowed
    InvalidPaymentTransition = 5010,
    /// No receipt has been uploaded
    ReceiptRequired = 5011,
    /// Payment has already been verified
    PaymentAlreadyVerified = 5012,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product has invalid price
    ProductInvalidPrice = 6002,
    /// Product does not have enough stock
    ProductOutOfStock = 6003,

    // ==================== 65xx: File Upload ====================
    /// File too large
    FileTooLarge = 6501,
    /// Unsupported file format
    UnsupportedFileFormat = 6502,
    /// Invalid/corrupted image file
    InvalidImageFile = 6503,
    /// No file provided in request
    NoFileProvided = 6504,
    /// Empty file provided
    EmptyFile = 6505,
    /// File storage failed
    FileStorageFailed = 6509,

    // ==================== 7xxx: Engagement ====================
    /// Contact message not found
    ContactMessageNotFound = 7001,
    /// Content block not found
    ContentNotFound = 7101,
    /// Newsletter subscriber not found
    SubscriberNotFound = 7201,

    // ==================== 8xxx: User ====================
    /// User not found
    UserNotFound = 8001,
    /// Email already registered
    EmailAlreadyRegistered = 8002,
    /// Cannot delete or demote self
    UserCannotModifySelf = 8003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// Database handle unavailable
    DatabaseUnavailable = 9006,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::RateLimited => "Too many requests, try again later",

            // Auth
            ErrorCode::NotAuthenticated => "Not authorized to access this route",
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::VerificationCodeExpired => "Verification code has expired",
            ErrorCode::VerificationCodeInvalid => "Invalid verification code",
            ErrorCode::TooManyAttempts => "Too many attempts, request a new code",
            ErrorCode::PasswordTooShort => "Password must be at least 8 characters",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::NotResourceOwner => "Not authorized to access this resource",
            ErrorCode::EmailNotVerified => "Please verify your email first",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "No order items",
            ErrorCode::InvalidStatusTransition => "Order status transition is not allowed",
            ErrorCode::OrderNumberExhausted => "No order numbers left for this month",
            ErrorCode::InvalidShippingAddress => "Shipping address is incomplete",

            // Payment
            ErrorCode::PaymentInvalidMethod => "Payment method does not support this operation",
            ErrorCode::InvalidPaymentTransition => "Payment status transition is not allowed",
            ErrorCode::ReceiptRequired => "No payment receipt uploaded for this order",
            ErrorCode::PaymentAlreadyVerified => "Payment has already been verified",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::ProductOutOfStock => "Product does not have enough stock",

            // File Upload
            ErrorCode::FileTooLarge => "File too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::InvalidImageFile => "Invalid image file",
            ErrorCode::NoFileProvided => "Please upload a file",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::FileStorageFailed => "Failed to store file",

            // Engagement
            ErrorCode::ContactMessageNotFound => "Contact message not found",
            ErrorCode::ContentNotFound => "Content not found",
            ErrorCode::SubscriberNotFound => "Subscriber not found",

            // User
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::EmailAlreadyRegistered => "Email already registered",
            ErrorCode::UserCannotModifySelf => "Administrators cannot modify their own account here",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::DatabaseUnavailable => "Database is unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),
            9 => Ok(ErrorCode::RateLimited),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1011 => Ok(ErrorCode::VerificationCodeExpired),
            1012 => Ok(ErrorCode::VerificationCodeInvalid),
            1013 => Ok(ErrorCode::TooManyAttempts),
            1014 => Ok(ErrorCode::PasswordTooShort),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2003 => Ok(ErrorCode::AdminRequired),
            2006 => Ok(ErrorCode::NotResourceOwner),
            2007 => Ok(ErrorCode::EmailNotVerified),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4010 => Ok(ErrorCode::InvalidStatusTransition),
            4011 => Ok(ErrorCode::OrderNumberExhausted),
            4012 => Ok(ErrorCode::InvalidShippingAddress),

            // Payment
            5003 => Ok(ErrorCode::PaymentInvalidMethod),
            5010 => Ok(ErrorCode::InvalidPaymentTransition),
            5011 => Ok(ErrorCode::ReceiptRequired),
            5012 => Ok(ErrorCode::PaymentAlreadyVerified),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::ProductInvalidPrice),
            6003 => Ok(ErrorCode::ProductOutOfStock),

            // File Upload
            6501 => Ok(ErrorCode::FileTooLarge),
            6502 => Ok(ErrorCode::UnsupportedFileFormat),
            6503 => Ok(ErrorCode::InvalidImageFile),
            6504 => Ok(ErrorCode::NoFileProvided),
            6505 => Ok(ErrorCode::EmptyFile),
            6509 => Ok(ErrorCode::FileStorageFailed),

            // Engagement
            7001 => Ok(ErrorCode::ContactMessageNotFound),
            7101 => Ok(ErrorCode::ContentNotFound),
            7201 => Ok(ErrorCode::SubscriberNotFound),

            // User
            8001 => Ok(ErrorCode::UserNotFound),
            8002 => Ok(ErrorCode::EmailAlreadyRegistered),
            8003 => Ok(ErrorCode::UserCannotModifySelf),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::DatabaseUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}
