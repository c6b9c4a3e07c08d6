//! Upload Routes
//!
//! Product images are public; receipts are only reachable through the
//! order endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::Response,
    routing::get,
};

use crate::core::ServerState;
use crate::services::storage::FileCategory;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new().route("/uploads/products/{file}", get(serve_product_image))
}

/// GET /uploads/products/:file - 商品图片
async fn serve_product_image(
    State(state): State<ServerState>,
    Path(file): Path<String>,
) -> AppResult<Response> {
    let reference = format!("{}/{}", FileCategory::Products.dir_name(), file);
    let data = state.storage.read(&reference).await?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok(super::file_response(data, mime.as_ref(), None))
}
