//! Email OTP Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{EmailOtp, OtpPurpose};
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "email_otp";

#[derive(Clone)]
pub struct EmailOtpRepository {
    base: BaseRepository,
}

impl EmailOtpRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find(&self, email: &str, purpose: OtpPurpose) -> RepoResult<Option<EmailOtp>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM email_otp WHERE email = $email AND purpose = $purpose LIMIT 1")
            .bind(("email", email.to_string()))
            .bind(("purpose", purpose.as_str()))
            .await?;
        let codes: Vec<EmailOtp> = result.take(0)?;
        Ok(codes.into_iter().next())
    }

    /// Replace any pending code for (email, purpose), resetting the attempt counter
    pub async fn replace(
        &self,
        email: &str,
        purpose: OtpPurpose,
        code_hash: String,
        expires_at: i64,
    ) -> RepoResult<EmailOtp> {
        let mut result = self
            .base
            .db()
            .query(
                "UPSERT email_otp SET email = $email, purpose = $purpose, code_hash = $hash, \
                 expires_at = $expires, attempts = 0, created_at = $now \
                 WHERE email = $email AND purpose = $purpose RETURN AFTER",
            )
            .bind(("email", email.to_string()))
            .bind(("purpose", purpose.as_str()))
            .bind(("hash", code_hash))
            .bind(("expires", expires_at))
            .bind(("now", now_millis()))
            .await?;
        let codes: Vec<EmailOtp> = result.take(0)?;
        codes
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Database("Failed to store verification code".to_string()))
    }

    pub async fn increment_attempts(&self, id: &RecordId) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE $id SET attempts += 1")
            .bind(("id", id.clone()))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn delete(&self, id: &RecordId) -> RepoResult<()> {
        let _: Option<EmailOtp> = self.base.db().delete(id.clone()).await?;
        Ok(())
    }

    /// Remove codes that expired before `now`
    pub async fn purge_expired(&self) -> RepoResult<()> {
        self.base
            .db()
            .query(format!("DELETE {TABLE} WHERE expires_at < $now"))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }
}
