//! Site Content Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{SiteContent, SiteContentUpsert};
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct ContentRepository {
    base: BaseRepository,
}

impl ContentRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_all(&self) -> RepoResult<Vec<SiteContent>> {
        let blocks: Vec<SiteContent> = self
            .base
            .db()
            .query("SELECT * FROM site_content ORDER BY key")
            .await?
            .take(0)?;
        Ok(blocks)
    }

    pub async fn find_by_key(&self, key: &str) -> RepoResult<Option<SiteContent>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM site_content WHERE key = $key LIMIT 1")
            .bind(("key", key.to_string()))
            .await?;
        let blocks: Vec<SiteContent> = result.take(0)?;
        Ok(blocks.into_iter().next())
    }

    pub async fn upsert(&self, key: &str, data: SiteContentUpsert) -> RepoResult<SiteContent> {
        let mut result = self
            .base
            .db()
            .query(
                "UPSERT site_content SET key = $key, title = $title, body = $body, image = $image, \
                 updated_at = $now WHERE key = $key RETURN AFTER",
            )
            .bind(("key", key.to_string()))
            .bind(("title", data.title))
            .bind(("body", data.body))
            .bind(("image", data.image))
            .bind(("now", now_millis()))
            .await?;
        let blocks: Vec<SiteContent> = result.take(0)?;
        blocks
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Database("Failed to save content".to_string()))
    }

    pub async fn delete(&self, key: &str) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query("DELETE site_content WHERE key = $key RETURN BEFORE")
            .bind(("key", key.to_string()))
            .await?;
        let deleted: Vec<SiteContent> = result.take(0)?;
        Ok(!deleted.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_upsert_by_key() {
        let db = DbService::in_memory().await.unwrap();
        let repo = ContentRepository::new(db.db);

        let first = repo
            .upsert(
                "about",
                SiteContentUpsert {
                    title: "About".into(),
                    body: "v1".into(),
                    image: None,
                },
            )
            .await
            .unwrap();
        let second = repo
            .upsert(
                "about",
                SiteContentUpsert {
                    title: "About us".into(),
                    body: "v2".into(),
                    image: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
        assert_eq!(repo.find_by_key("about").await.unwrap().unwrap().body, "v2");

        assert!(repo.delete("about").await.unwrap());
        assert!(!repo.delete("about").await.unwrap());
    }
}
