//! Wishlist Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::Wishlist;
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct WishlistRepository {
    base: BaseRepository,
}

impl WishlistRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_user(&self, user_id: &str) -> RepoResult<Option<Wishlist>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM wishlist WHERE user_id = $user LIMIT 1")
            .bind(("user", user_id.to_string()))
            .await?;
        let lists: Vec<Wishlist> = result.take(0)?;
        Ok(lists.into_iter().next())
    }

    /// Add a product key, creating the wishlist on first use; adding twice is a no-op
    pub async fn add(&self, user_id: &str, product_id: &str) -> RepoResult<Wishlist> {
        let mut result = self
            .base
            .db()
            .query(
                "UPSERT wishlist SET user_id = $user, products = array::union(products ?? [], [$product]), \
                 updated_at = $now WHERE user_id = $user RETURN AFTER",
            )
            .bind(("user", user_id.to_string()))
            .bind(("product", product_id.to_string()))
            .bind(("now", now_millis()))
            .await?;
        let lists: Vec<Wishlist> = result.take(0)?;
        lists
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Database("Failed to update wishlist".to_string()))
    }

    /// Remove a product key; an absent wishlist stays absent
    pub async fn remove(&self, user_id: &str, product_id: &str) -> RepoResult<Option<Wishlist>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE wishlist SET products = array::complement(products, [$product]), \
                 updated_at = $now WHERE user_id = $user RETURN AFTER",
            )
            .bind(("user", user_id.to_string()))
            .bind(("product", product_id.to_string()))
            .bind(("now", now_millis()))
            .await?;
        let lists: Vec<Wishlist> = result.take(0)?;
        Ok(lists.into_iter().next())
    }

    /// Drop a deleted product from every wishlist
    pub async fn remove_product_everywhere(&self, product_id: &str) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE wishlist SET products = array::complement(products, [$product]) WHERE $product IN products")
            .bind(("product", product_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn delete_for_user(&self, user_id: &str) -> RepoResult<()> {
        self.base
            .db()
            .query("DELETE wishlist WHERE user_id = $user")
            .bind(("user", user_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let db = DbService::in_memory().await.unwrap();
        let repo = WishlistRepository::new(db.db);

        repo.add("u1", "p1").await.unwrap();
        repo.add("u1", "p2").await.unwrap();
        let list = repo.add("u1", "p1").await.unwrap();
        assert_eq!(list.products, vec!["p1".to_string(), "p2".to_string()]);

        let list = repo.remove("u1", "p1").await.unwrap().unwrap();
        assert_eq!(list.products, vec!["p2".to_string()]);

        repo.remove_product_everywhere("p2").await.unwrap();
        let list = repo.find_by_user("u1").await.unwrap().unwrap();
        assert!(list.products.is_empty());
        assert!(repo.find_by_user("u2").await.unwrap().is_none());
    }
}
