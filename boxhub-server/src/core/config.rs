use std::path::PathBuf;

use crate::auth::JwtConfig;
use crate::services::mailer::SmtpConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、上传文件、日志) |
/// | HTTP_PORT | 5000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | JWT_SECRET | (dev: generated) | JWT 密钥, 生产环境必填 |
/// | JWT_EXPIRATION_MINUTES | 43200 | 令牌有效期 (30 天) |
/// | ORDER_NUMBER_PREFIX | BOX | 订单号前缀 |
/// | OTP_TTL_MINUTES | 10 | 验证码有效期 |
/// | OTP_MAX_ATTEMPTS | 5 | 验证码最大尝试次数 |
/// | SMTP_HOST / SMTP_PORT / SMTP_USERNAME / SMTP_PASSWORD | - | SMTP 配置, 未设置时只记录邮件 |
/// | MAIL_FROM_EMAIL | noreply@boxhub.local | 发件地址 |
/// | MAIL_FROM_NAME | BoxHub | 发件人 |
/// | MAX_UPLOAD_BYTES | 5242880 | 上传文件大小上限 |
/// | LOGIN_RATE_LIMIT | 10 | 每 IP 每分钟登录/注册次数, 0 表示关闭 |
/// | ADMIN_EMAIL / ADMIN_PASSWORD | - | 首次启动时创建的管理员 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/srv/boxhub HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    /// 订单号前缀, e.g. `BOX` → `BOX-2403-0042`
    pub order_number_prefix: String,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: u32,
    /// `None` 时使用日志邮件客户端
    pub smtp: Option<SmtpConfig>,
    pub mail_from_email: String,
    pub mail_from_name: String,
    pub max_upload_bytes: usize,
    /// Requests per minute per client IP on login/register, 0 disables
    pub login_rate_limit: u32,
    /// Delivery attempts per queued email
    pub notification_max_attempts: u32,
    /// Base delay between delivery attempts (doubles each retry)
    pub notification_retry_base_ms: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Administrator account created on first start
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 生产环境缺少 `JWT_SECRET` 时返回错误
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        let bootstrap_admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            _ => None,
        };

        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            jwt: JwtConfig::from_env(&environment)?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            environment,
            order_number_prefix: std::env::var("ORDER_NUMBER_PREFIX")
                .unwrap_or_else(|_| "BOX".into()),
            otp_ttl_minutes: std::env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            otp_max_attempts: std::env::var("OTP_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            smtp,
            mail_from_email: std::env::var("MAIL_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@boxhub.local".into()),
            mail_from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "BoxHub".into()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1024 * 1024),
            login_rate_limit: std::env::var("LOGIN_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            notification_max_attempts: std::env::var("NOTIFICATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            notification_retry_base_ms: std::env::var("NOTIFICATION_RETRY_BASE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            bootstrap_admin,
        })
    }

    /// 测试用配置: 固定密钥, 关闭限流, 快速重试
    pub fn for_tests(work_dir: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port: 0,
            environment: "test".into(),
            log_level: "debug".into(),
            log_json: false,
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hs256".into(),
                expiration_minutes: 60,
                issuer: "boxhub".into(),
                audience: "boxhub-clients".into(),
            },
            order_number_prefix: "BOX".into(),
            otp_ttl_minutes: 10,
            otp_max_attempts: 5,
            smtp: None,
            mail_from_email: "noreply@boxhub.local".into(),
            mail_from_name: "BoxHub".into(),
            max_upload_bytes: 5 * 1024 * 1024,
            login_rate_limit: 0,
            notification_max_attempts: 3,
            notification_retry_base_ms: 5,
            bootstrap_admin: None,
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("uploads")
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 创建工作目录结构
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
