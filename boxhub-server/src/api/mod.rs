//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`uploads`] - 商品图片访问
//! - [`auth`] - 注册、验证码、登录、个人资料
//! - [`users`] - 用户管理 (管理员)
//! - [`products`] - 商品目录
//! - [`orders`] - 下单、履约、凭证、发票
//! - [`payments`] - 银行转账凭证审核 (管理员)
//! - [`wishlist`] - 心愿单
//! - [`newsletter`] - 邮件订阅
//! - [`contact`] - 联系表单
//! - [`content`] - 站点内容块

pub mod auth;
pub mod contact;
pub mod content;
pub mod health;
pub mod newsletter;
pub mod orders;
pub mod payments;
pub mod products;
pub mod uploads;
pub mod users;
pub mod wishlist;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Binary download with content type and file name
pub(crate) fn file_response(data: Vec<u8>, content_type: &str, filename: Option<&str>) -> Response {
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(name) = filename
        && let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
