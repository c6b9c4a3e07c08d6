//! Auth API 模块
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/auth/register | POST | 注册并发送验证码 | 无 (限流) |
//! | /api/auth/verify-otp | POST | 验证邮箱, 返回令牌 | 无 |
//! | /api/auth/resend-otp | POST | 重新发送验证码 | 无 |
//! | /api/auth/login | POST | 登录 | 无 (限流) |
//! | /api/auth/forgot-password | POST | 发送重置密码验证码 | 无 (限流) |
//! | /api/auth/reset-password | POST | 用验证码重置密码 | 无 |
//! | /api/auth/me | GET/PUT | 当前用户资料 | 需要 |
//! | /api/auth/password | PUT | 修改密码 | 需要 |

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::rate_limit::auth_rate_limit;
use crate::core::ServerState;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest("/api/auth", routes(state))
}

fn routes(state: &ServerState) -> Router<ServerState> {
    let limited = Router::new()
        .route("/register", post(handler::register))
        .route("/login", post(handler::login))
        .route("/forgot-password", post(handler::forgot_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_rate_limit));

    let open = Router::new()
        .route("/verify-otp", post(handler::verify_otp))
        .route("/resend-otp", post(handler::resend_otp))
        .route("/reset-password", post(handler::reset_password));

    let account = Router::new()
        .route("/me", get(handler::me).put(handler::update_me))
        .route("/password", put(handler::change_password));

    limited.merge(open).merge(account)
}
