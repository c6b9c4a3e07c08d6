//! 认证授权模块
//!
//! - [`JwtService`] - JWT 令牌服务
//! - [`CurrentUser`] - 当前用户上下文
//! - [`require_auth`] / [`require_admin`] - 认证与管理员中间件
//! - [`password`] - Argon2 密码哈希
//! - [`otp`] - 邮箱验证码
//! - [`rate_limit`] - 登录/注册限流

pub mod extractor;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod rate_limit;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::{require_admin, require_auth};
pub use rate_limit::RateLimiter;
