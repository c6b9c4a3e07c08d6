//! Email one-time codes
//!
//! Six-digit codes, stored only as Argon2 hashes, one pending code per
//! (email, purpose). A code expires after the configured TTL or after too
//! many wrong guesses, and is consumed on success.

use rand::Rng;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::util::now_millis;

use super::password::{hash_password_async, verify_password_async};
use crate::db::models::OtpPurpose;
use crate::db::repository::EmailOtpRepository;

/// Random 6-digit code, never starting with 0
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[derive(Clone)]
pub struct OtpService {
    repo: EmailOtpRepository,
    ttl_minutes: i64,
    max_attempts: u32,
}

impl OtpService {
    pub fn new(repo: EmailOtpRepository, ttl_minutes: i64, max_attempts: u32) -> Self {
        Self {
            repo,
            ttl_minutes,
            max_attempts,
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    /// Issue a fresh code, replacing any pending one; returns the plain code for mailing
    pub async fn issue(&self, email: &str, purpose: OtpPurpose) -> AppResult<String> {
        if let Err(e) = self.repo.purge_expired().await {
            tracing::warn!(error = %e, "Failed to purge expired verification codes");
        }

        let code = generate_code();
        let hash = hash_password_async(code.clone()).await?;
        let expires_at = now_millis() + self.ttl_minutes * 60_000;
        self.repo.replace(email, purpose, hash, expires_at).await?;
        tracing::debug!(email = %email, purpose = purpose.as_str(), "Verification code issued");
        Ok(code)
    }

    /// Check a submitted code; consumed on success
    pub async fn verify(&self, email: &str, purpose: OtpPurpose, code: &str) -> AppResult<()> {
        let Some(otp) = self.repo.find(email, purpose).await? else {
            return Err(AppError::new(ErrorCode::VerificationCodeInvalid));
        };

        if otp.expires_at < now_millis() {
            self.repo.delete(&otp.id).await?;
            return Err(AppError::new(ErrorCode::VerificationCodeExpired));
        }
        if otp.attempts >= self.max_attempts {
            self.repo.delete(&otp.id).await?;
            return Err(AppError::new(ErrorCode::TooManyAttempts));
        }

        if !verify_password_async(code.trim().to_string(), otp.code_hash.clone()).await {
            self.repo.increment_attempts(&otp.id).await?;
            return Err(AppError::new(ErrorCode::VerificationCodeInvalid));
        }

        self.repo.delete(&otp.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    async fn service(ttl_minutes: i64) -> OtpService {
        let db = DbService::in_memory().await.unwrap();
        OtpService::new(EmailOtpRepository::new(db.db), ttl_minutes, 2)
    }

    #[test]
    fn test_code_format() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let otp = service(10).await;
        let code = otp.issue("a@example.com", OtpPurpose::VerifyEmail).await.unwrap();

        otp.verify("a@example.com", OtpPurpose::VerifyEmail, &code)
            .await
            .unwrap();
        let err = otp
            .verify("a@example.com", OtpPurpose::VerifyEmail, &code)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationCodeInvalid);
    }

    #[tokio::test]
    async fn test_purposes_are_separate() {
        let otp = service(10).await;
        let code = otp.issue("a@example.com", OtpPurpose::ResetPassword).await.unwrap();
        assert!(
            otp.verify("a@example.com", OtpPurpose::VerifyEmail, &code)
                .await
                .is_err()
        );
        otp.verify("a@example.com", OtpPurpose::ResetPassword, &code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_attempt_limit() {
        let otp = service(10).await;
        let code = otp.issue("a@example.com", OtpPurpose::VerifyEmail).await.unwrap();
        let wrong = if code == "111111" { "222222" } else { "111111" };

        for _ in 0..2 {
            let err = otp
                .verify("a@example.com", OtpPurpose::VerifyEmail, wrong)
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::VerificationCodeInvalid);
        }
        // Even the right code is refused once the limit is reached
        let err = otp
            .verify("a@example.com", OtpPurpose::VerifyEmail, &code)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TooManyAttempts);
    }

    #[tokio::test]
    async fn test_expired_code() {
        let otp = service(-1).await;
        let code = otp.issue("a@example.com", OtpPurpose::VerifyEmail).await.unwrap();
        let err = otp
            .verify("a@example.com", OtpPurpose::VerifyEmail, &code)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerificationCodeExpired);
    }
}
