//! Newsletter Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::query::ListQuery;
use crate::db::models::NewsletterSubscriber;
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "newsletter_subscriber";

#[derive(Clone)]
pub struct NewsletterRepository {
    base: BaseRepository,
}

impl NewsletterRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Listing over this table, refined by the caller
    pub fn list_query() -> ListQuery {
        ListQuery::new(TABLE)
    }

    pub async fn list(&self, query: ListQuery) -> RepoResult<(Vec<NewsletterSubscriber>, u64)> {
        query.execute(self.base.db()).await
    }

    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<NewsletterSubscriber>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM newsletter_subscriber WHERE email = $email LIMIT 1")
            .bind(("email", email.to_string()))
            .await?;
        let subscribers: Vec<NewsletterSubscriber> = result.take(0)?;
        Ok(subscribers.into_iter().next())
    }

    /// Subscribe or resubscribe
    pub async fn subscribe(&self, email: &str) -> RepoResult<NewsletterSubscriber> {
        let mut result = self
            .base
            .db()
            .query(
                "UPSERT newsletter_subscriber SET email = $email, is_subscribed = true, \
                 subscribed_at = $now, unsubscribed_at = NONE WHERE email = $email RETURN AFTER",
            )
            .bind(("email", email.to_string()))
            .bind(("now", now_millis()))
            .await?;
        let subscribers: Vec<NewsletterSubscriber> = result.take(0)?;
        subscribers
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Database("Failed to subscribe".to_string()))
    }

    /// Returns `None` when the address was never subscribed
    pub async fn unsubscribe(&self, email: &str) -> RepoResult<Option<NewsletterSubscriber>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE newsletter_subscriber SET is_subscribed = false, unsubscribed_at = $now \
                 WHERE email = $email RETURN AFTER",
            )
            .bind(("email", email.to_string()))
            .bind(("now", now_millis()))
            .await?;
        let subscribers: Vec<NewsletterSubscriber> = result.take(0)?;
        Ok(subscribers.into_iter().next())
    }
}
