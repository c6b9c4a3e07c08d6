//! 认证中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::Method;
use shared::error::{AppError, ErrorCode};

use crate::auth::{CurrentUser, JwtService};
use crate::auth::extractor::authenticate;
use crate::core::ServerState;
use crate::security_log;

/// Routes reachable without a token
///
/// Catalog and content reads, the account entry points, newsletter and the
/// contact form.
pub fn is_public_route(method: &Method, path: &str) -> bool {
    if *method == Method::GET {
        return path == "/api/products"
            || path.starts_with("/api/products/")
            || path == "/api/content"
            || path.starts_with("/api/content/");
    }
    if *method == Method::POST {
        return matches!(
            path,
            "/api/auth/register"
                | "/api/auth/verify-otp"
                | "/api/auth/resend-otp"
                | "/api/auth/login"
                | "/api/auth/forgot-password"
                | "/api/auth/reset-password"
                | "/api/newsletter/subscribe"
                | "/api/newsletter/unsubscribe"
                | "/api/contact"
        );
    }
    false
}

/// 认证中间件 - 要求用户登录
///
/// 从 `Authorization: Bearer <token>` 头提取并验证 JWT, 成功后将
/// [`CurrentUser`] 注入请求扩展。
///
/// # 跳过认证
///
/// - `OPTIONS *` (CORS 预检)
/// - 非 `/api/` 路径 (`/health`, `/uploads/...`)
/// - [`is_public_route`] 列出的公共接口
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 NotAuthenticated |
/// | 令牌过期 | 401 TokenExpired |
/// | 无效令牌 | 401 TokenInvalid |
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();

    if req.method() == Method::OPTIONS || !path.starts_with("/api/") {
        return Ok(next.run(req).await);
    }

    if is_public_route(req.method(), path) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
        None => {
            security_log!("WARN", "auth_missing", uri = format!("{:?}", req.uri()));
            return Err(AppError::unauthorized());
        }
    };

    let user = authenticate(&state.jwt_service, token, req.uri())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// 管理员中间件 - 要求管理员角色
///
/// 非管理员返回 403 AdminRequired
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(AppError::unauthorized)?;
    if !user.is_admin() {
        security_log!(
            "WARN",
            "admin_required",
            user_id = user.id.clone(),
            uri = format!("{:?}", req.uri())
        );
        return Err(AppError::new(ErrorCode::AdminRequired));
    }

    Ok(next.run(req).await)
}
