//! 服务模块
//!
//! - [`https`] - HTTP 路由组装与服务
//! - [`mailer`] - 邮件发送
//! - [`notifier`] - 邮件通知队列
//! - [`storage`] - 上传文件存储

pub mod https;
pub mod mailer;
pub mod notifier;
pub mod storage;

pub use https::{HttpsService, build_app};
pub use notifier::NotificationService;
