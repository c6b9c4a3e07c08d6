//! Product Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::query::ListQuery;
use crate::db::models::{Product, ProductCreate, ProductUpdate};
use serde::Serialize;
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "product";

#[derive(Debug, Serialize)]
struct ProductInsert {
    name: String,
    description: String,
    price: f64,
    stock: i64,
    category: String,
    images: Vec<String>,
    is_featured: bool,
    is_current_box: bool,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Listing over this table, refined by the caller
    pub fn list_query() -> ListQuery {
        ListQuery::new(TABLE)
    }

    pub async fn list(&self, query: ListQuery) -> RepoResult<(Vec<Product>, u64)> {
        query.execute(self.base.db()).await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let product: Option<Product> = self.base.db().select((TABLE, id)).await?;
        Ok(product)
    }

    /// Active featured products, newest first
    pub async fn find_featured(&self) -> RepoResult<Vec<Product>> {
        let products: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_featured = true AND is_active = true ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(products)
    }

    pub async fn find_current_box(&self) -> RepoResult<Option<Product>> {
        let products: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_current_box = true AND is_active = true LIMIT 1")
            .await?
            .take(0)?;
        Ok(products.into_iter().next())
    }

    /// Clear the current-box flag everywhere except `keep`
    async fn clear_current_box(&self, keep: Option<&str>) -> RepoResult<()> {
        let keep = keep.map(|k| RecordId::from_table_key(TABLE, k));
        self.base
            .db()
            .query("UPDATE product SET is_current_box = false WHERE is_current_box = true AND id != $keep")
            .bind(("keep", keep))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn create(&self, data: ProductCreate) -> RepoResult<Product> {
        let now = now_millis();
        let is_current_box = data.is_current_box.unwrap_or(false);
        let insert = ProductInsert {
            name: data.name,
            description: data.description.unwrap_or_default(),
            price: data.price,
            stock: data.stock,
            category: data.category.unwrap_or_default(),
            images: data.images.unwrap_or_default(),
            is_featured: data.is_featured.unwrap_or(false),
            is_current_box,
            is_active: data.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let created: Option<Product> = self.base.db().create(TABLE).content(insert).await?;
        let created =
            created.ok_or_else(|| RepoError::Database("Failed to create product".to_string()))?;

        if is_current_box {
            self.clear_current_box(Some(&created.key())).await?;
        }
        Ok(created)
    }

    pub async fn update(&self, id: &str, data: ProductUpdate) -> RepoResult<Product> {
        let becomes_current_box = data.is_current_box == Some(true);
        let mut value =
            serde_json::to_value(&data).map_err(|e| RepoError::Validation(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.insert("updated_at".into(), now_millis().into());
        }

        let mut result = self
            .base
            .db()
            .query("UPDATE $id MERGE $data RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("data", value))
            .await?;
        let products: Vec<Product> = result.take(0)?;
        let product = products
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))?;

        if becomes_current_box {
            self.clear_current_box(Some(id)).await?;
        }
        Ok(product)
    }

    pub async fn add_image(&self, id: &str, url: String) -> RepoResult<Product> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id SET images += $url, updated_at = $now RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("url", url))
            .bind(("now", now_millis()))
            .await?;
        let products: Vec<Product> = result.take(0)?;
        products
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
    }

    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let deleted: Option<Product> = self.base.db().delete((TABLE, id)).await?;
        Ok(deleted.is_some())
    }

    /// Atomically take `quantity` units if at least that many are in stock
    ///
    /// Returns `None` when the stock was insufficient at write time.
    pub async fn reserve_stock(&self, id: &str, quantity: i64) -> RepoResult<Option<Product>> {
        let mut result = self
            .base
            .db()
            .query("UPDATE $id SET stock -= $qty, updated_at = $now WHERE stock >= $qty RETURN AFTER")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("qty", quantity))
            .bind(("now", now_millis()))
            .await?;
        let products: Vec<Product> = result.take(0)?;
        Ok(products.into_iter().next())
    }

    /// Give back units taken by [`reserve_stock`](Self::reserve_stock)
    pub async fn restore_stock(&self, id: &str, quantity: i64) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE $id SET stock += $qty, updated_at = $now")
            .bind(("id", RecordId::from_table_key(TABLE, id)))
            .bind(("qty", quantity))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }
}
