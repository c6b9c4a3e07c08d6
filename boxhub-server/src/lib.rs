//! BoxHub Server - 订阅盒电商后端
//!
//! # 架构概述
//!
//! - **订单** (`orders`): 下单、履约状态机、银行转账凭证审核
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//! - **认证** (`auth`): JWT + Argon2 + 邮箱验证码
//! - **服务** (`services`): 邮件通知队列、文件存储、HTTP 服务
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! boxhub-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证、权限、验证码、限流
//! ├── db/            # 模型、仓储、分页查询
//! ├── orders/        # 下单、状态机、订单号、发票
//! ├── services/      # 邮件、通知、存储、HTTP
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、校验、上传
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod orders;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::OrderService;
pub use services::build_app;
pub use shared::error::{AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
    ____              __  __      __
   / __ )____  _  __/ / / /_  __/ /_
  / __  / __ \| |/_/ /_/ / / / / __ \
 / /_/ / /_/ />  </ __  / /_/ / /_/ /
/_____/\____/_/|_/_/ /_/\__,_/_.___/
    "#
    );
}

/// 设置环境: 加载 .env, 初始化日志
///
/// Logs go to `WORK_DIR/logs` unless `LOG_TO_FILE=false`.
pub fn setup_environment() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_JSON").map(|v| v == "true").unwrap_or(false);
    let to_file = std::env::var("LOG_TO_FILE").map(|v| v != "false").unwrap_or(true);

    if to_file {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        let log_dir = std::path::Path::new(&work_dir).join("logs");
        init_logger_with_file(&level, json, Some(&log_dir))
    } else {
        init_logger(&level, json)
    }
}
