//! Email OTP Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

/// Pending one-time code, at most one per (email, purpose)
///
/// Never serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailOtp {
    pub id: RecordId,
    pub email: String,
    pub purpose: OtpPurpose,
    /// Argon2 hash of the 6-digit code
    pub code_hash: String,
    pub expires_at: i64,
    #[serde(default)]
    pub attempts: u32,
    pub created_at: i64,
}
