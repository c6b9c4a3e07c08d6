use std::sync::Arc;
use std::time::Duration;

use shared::util::normalize_email;

use crate::auth::password::hash_password_async;
use crate::auth::otp::OtpService;
use crate::auth::{JwtService, RateLimiter};
use crate::core::{Config, Result, ServerError};
use crate::db::DbService;
use crate::db::models::UserRole;
use crate::db::repository::user::NewUser;
use crate::db::repository::{
    ContactRepository, ContentRepository, EmailOtpRepository, NewsletterRepository,
    ProductRepository, UserRepository, WishlistRepository,
};
use crate::orders::OrderService;
use crate::services::mailer::{DynMailClient, EmailMessage, create_mail_client};
use crate::services::notifier::{NotificationService, RetryPolicy};
use crate::services::storage::{FileStorage, LocalFileStorage};

/// Rate limiter entries are swept this often
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// 服务器状态 - 持有所有服务的共享引用
///
/// Clone 是浅拷贝, 每个请求拿到的都是同一组服务。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | 嵌入式数据库 |
/// | jwt_service | JWT 认证服务 |
/// | notifier | 邮件通知队列 |
/// | storage | 上传文件存储 |
/// | orders | 订单与支付流程 |
/// | otp | 邮箱验证码 |
/// | rate_limiter | 登录/注册限流 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub jwt_service: Arc<JwtService>,
    pub notifier: NotificationService,
    pub storage: Arc<dyn FileStorage>,
    pub orders: OrderService,
    pub otp: OtpService,
    pub rate_limiter: RateLimiter,
    pub users: UserRepository,
    pub products: ProductRepository,
    pub wishlists: WishlistRepository,
    pub newsletter: NewsletterRepository,
    pub contacts: ContactRepository,
    pub content: ContentRepository,
}

impl ServerState {
    /// Wire every service over an open database
    ///
    /// Spawns the notification worker, so it must run inside a tokio runtime.
    pub fn new(config: Config, db: DbService, mailer: DynMailClient) -> Self {
        let handle = db.db.clone();
        let notifier = NotificationService::start(
            mailer,
            RetryPolicy {
                max_attempts: config.notification_max_attempts,
                base_delay_ms: config.notification_retry_base_ms,
            },
        );
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            config.uploads_dir(),
            config.max_upload_bytes,
        ));
        let orders = OrderService::new(
            handle.clone(),
            notifier.clone(),
            storage.clone(),
            config.order_number_prefix.clone(),
            config.mail_from_name.clone(),
        );
        let otp = OtpService::new(
            EmailOtpRepository::new(handle.clone()),
            config.otp_ttl_minutes,
            config.otp_max_attempts,
        );

        Self {
            jwt_service: Arc::new(JwtService::with_config(config.jwt.clone())),
            notifier,
            storage,
            orders,
            otp,
            rate_limiter: RateLimiter::new(),
            users: UserRepository::new(handle.clone()),
            products: ProductRepository::new(handle.clone()),
            wishlists: WishlistRepository::new(handle.clone()),
            newsletter: NewsletterRepository::new(handle.clone()),
            contacts: ContactRepository::new(handle.clone()),
            content: ContentRepository::new(handle),
            db,
            config,
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 创建工作目录结构
    /// 2. 打开数据库 (失败即退出, 不进入降级模式)
    /// 3. 选择邮件客户端
    /// 4. 创建初始管理员
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_dir();
        let db_path = db_path
            .to_str()
            .ok_or_else(|| ServerError::Config(format!("Invalid database path: {db_path:?}")))?;
        let db = DbService::open(db_path).await.map_err(ServerError::Database)?;

        let mailer = create_mail_client(
            config.smtp.as_ref(),
            &config.mail_from_email,
            &config.mail_from_name,
        )?;

        let state = Self::new(config.clone(), db, mailer);
        state.ensure_admin().await?;
        Ok(state)
    }

    /// Create the configured administrator if the account does not exist yet
    async fn ensure_admin(&self) -> Result<()> {
        let Some(admin) = &self.config.bootstrap_admin else {
            return Ok(());
        };
        let email = normalize_email(&admin.email);

        match self.users.find_by_email(&email).await.map_err(|e| ServerError::Database(e.into()))? {
            Some(user) if user.role == UserRole::Admin => {
                tracing::debug!(email = %email, "Bootstrap administrator already present");
            }
            Some(_) => {
                tracing::warn!(
                    email = %email,
                    "ADMIN_EMAIL belongs to a non-admin account, leaving it unchanged"
                );
            }
            None => {
                let password_hash = hash_password_async(admin.password.clone())
                    .await
                    .map_err(|e| ServerError::Internal(e.into()))?;
                self.users
                    .create(NewUser {
                        name: "Administrator".into(),
                        email: email.clone(),
                        password_hash,
                        role: UserRole::Admin,
                        is_verified: true,
                    })
                    .await
                    .map_err(|e| ServerError::Database(e.into()))?;
                tracing::info!(email = %email, "Bootstrap administrator created");
            }
        }
        Ok(())
    }

    /// Start periodic housekeeping
    pub fn start_background_tasks(&self) {
        let limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });

        tokio::spawn(crate::utils::logger::periodic_cleanup(self.config.logs_dir()));
    }

    /// Shop name used in mail and invoices
    pub fn shop_name(&self) -> &str {
        &self.config.mail_from_name
    }

    /// Queue an email; never fails the caller
    pub fn notify(&self, message: EmailMessage) {
        self.notifier.enqueue(message);
    }
}
