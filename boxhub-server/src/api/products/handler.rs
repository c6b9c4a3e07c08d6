//! Product API Handlers

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::{ApiResponse, ListResponse};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Product, ProductCreate, ProductUpdate};
use crate::db::query::ListParams;
use crate::db::repository::ProductRepository;
use crate::orders::money::is_valid_price;
use crate::services::storage::FileCategory;
use crate::utils::multipart::require_file_field;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, MAX_TEXT_LEN, validate_optional_text, validate_required_text,
};

const SORT_FIELDS: &[&str] = &["created_at", "name", "price", "stock"];

/// `GET /api/products` filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub featured: Option<bool>,
    /// Honored for administrators only
    #[serde(default)]
    pub include_inactive: bool,
}

fn validate_price(price: f64) -> AppResult<()> {
    if !is_valid_price(price) {
        return Err(AppError::with_message(
            ErrorCode::ProductInvalidPrice,
            format!("Invalid price: {price}"),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::validation("Stock cannot be negative"));
    }
    Ok(())
}

fn validate_create(data: &ProductCreate) -> AppResult<()> {
    validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
    validate_optional_text(&data.description, "description", MAX_TEXT_LEN)?;
    validate_optional_text(&data.category, "category", MAX_SHORT_TEXT_LEN)?;
    validate_price(data.price)?;
    validate_stock(data.stock)
}

fn validate_update(data: &ProductUpdate) -> AppResult<()> {
    if let Some(name) = &data.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    validate_optional_text(&data.description, "description", MAX_TEXT_LEN)?;
    validate_optional_text(&data.category, "category", MAX_SHORT_TEXT_LEN)?;
    if let Some(price) = data.price {
        validate_price(price)?;
    }
    if let Some(stock) = data.stock {
        validate_stock(stock)?;
    }
    Ok(())
}

fn product_not_found(id: &str) -> AppError {
    AppError::with_message(ErrorCode::ProductNotFound, format!("Product {id} not found"))
        .with_detail("product_id", id.to_string())
}

async fn load_product(state: &ServerState, id: &str) -> AppResult<Product> {
    state
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| product_not_found(id))
}

/// GET /api/products - 商品列表 (?category=&featured=&search=&sort=&page=&limit=)
pub async fn list(
    State(state): State<ServerState>,
    current_user: Option<CurrentUser>,
    Query(filter): Query<ProductFilter>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ListResponse<Product>>> {
    let is_admin = current_user.is_some_and(|u| u.is_admin());

    let mut query = ProductRepository::list_query();
    if !(filter.include_inactive && is_admin) {
        query = query.filter_eq("is_active", true);
    }
    if let Some(category) = filter.category.filter(|c| !c.trim().is_empty()) {
        query = query.filter_eq("category", category.trim().to_string());
    }
    if let Some(featured) = filter.featured {
        query = query.filter_eq("is_featured", featured);
    }
    let query = query
        .search(&["name", "description"], params.search.as_deref())
        .sort(params.sort.as_deref(), SORT_FIELDS, "created_at DESC")
        .page(params.page(), params.limit());

    let (products, total) = state.products.list(query).await?;
    Ok(Json(ListResponse::new(
        products,
        total,
        params.page(),
        params.limit(),
    )))
}

/// GET /api/products/featured - 推荐商品
pub async fn featured(State(state): State<ServerState>) -> AppResult<Json<ListResponse<Product>>> {
    let products = state.products.find_featured().await?;
    Ok(Json(ListResponse::all(products)))
}

/// GET /api/products/current-box - 本月订阅盒
pub async fn current_box(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Product>>> {
    let product = state.products.find_current_box().await?.ok_or_else(|| {
        AppError::with_message(ErrorCode::ProductNotFound, "No current box is set")
    })?;
    Ok(Json(ApiResponse::success(product)))
}

/// GET /api/products/{id} - 商品详情
///
/// Inactive products are hidden from everyone but administrators.
pub async fn get_by_id(
    State(state): State<ServerState>,
    current_user: Option<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = load_product(&state, &id).await?;
    if !product.is_active && !current_user.is_some_and(|u| u.is_admin()) {
        return Err(product_not_found(&id));
    }
    Ok(Json(ApiResponse::success(product)))
}

/// POST /api/products - 创建商品
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    validate_create(&payload)?;
    let product = state.products.create(payload).await?;
    tracing::info!(product_id = %product.key(), name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

/// PUT /api/products/{id} - 更新商品
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<ApiResponse<Product>>> {
    validate_update(&payload)?;
    load_product(&state, &id).await?;
    let product = state.products.update(&id, payload).await?;
    tracing::info!(product_id = %id, "Product updated");
    Ok(Json(ApiResponse::success(product)))
}

/// DELETE /api/products/{id} - 删除商品
///
/// Past orders keep their frozen copy of the product.
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let product = load_product(&state, &id).await?;
    if !state.products.delete(&id).await? {
        return Err(product_not_found(&id));
    }

    if let Err(e) = state.wishlists.remove_product_everywhere(&id).await {
        tracing::warn!(product_id = %id, error = %e, "Failed to prune wishlists");
    }
    for url in &product.images {
        if let Some(reference) = url.strip_prefix("/uploads/")
            && let Err(e) = state.storage.delete(reference).await
        {
            tracing::warn!(product_id = %id, reference = %reference, error = %e, "Failed to delete product image");
        }
    }

    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(ApiResponse::ok_message("Product deleted")))
}

/// POST /api/products/{id}/images - 上传商品图片 (multipart 字段 `image`)
pub async fn upload_image(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    load_product(&state, &id).await?;
    let file = require_file_field(&mut multipart, "image").await?;
    let stored = state.storage.store(FileCategory::Products, file).await?;

    match state.products.add_image(&id, stored.public_url()).await {
        Ok(product) => Ok(Json(ApiResponse::success(product))),
        Err(e) => {
            // Product vanished between the check and the write
            if let Err(err) = state.storage.delete(&stored.reference).await {
                tracing::warn!(reference = %stored.reference, error = %err, "Failed to remove orphaned image");
            }
            Err(e.into())
        }
    }
}
