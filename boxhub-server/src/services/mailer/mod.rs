//! Outgoing mail
//!
//! [`MailClient`] is the transport seam: SMTP in production, a log-only
//! client when SMTP is not configured, and an in-memory recorder for tests.

mod smtp;
pub mod templates;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use smtp::SmtpMailClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_html: Option<String>,
    pub body_text: Option<String>,
}

impl EmailMessage {
    /// Message with both an HTML and a plain-text body
    pub fn new(to: impl Into<String>, subject: impl Into<String>, (html, text): (String, String)) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body_html: Some(html),
            body_text: Some(text),
        }
    }
}

#[async_trait::async_trait]
pub trait MailClient: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

pub type DynMailClient = Arc<dyn MailClient>;

/// SMTP connection settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Choose the transport from configuration
pub fn create_mail_client(
    smtp: Option<&SmtpConfig>,
    from_email: &str,
    from_name: &str,
) -> Result<DynMailClient> {
    match smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Using SMTP mail transport");
            Ok(Arc::new(SmtpMailClient::new(smtp, from_email, from_name)?))
        }
        None => {
            tracing::warn!("SMTP not configured, outgoing mail will only be logged");
            Ok(Arc::new(LogMailClient))
        }
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailClient;

#[async_trait::async_trait]
impl MailClient for LogMailClient {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = message.body_text.as_deref().unwrap_or_default(),
            "Mail (not sent, SMTP disabled)"
        );
        Ok(())
    }
}

/// Records every delivered message; can be told to fail the first N sends
#[derive(Default)]
pub struct MemoryMailClient {
    sent: Mutex<Vec<EmailMessage>>,
    failures_left: AtomicU32,
}

impl MemoryMailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` sends before succeeding
    pub fn failing(times: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(times),
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// Wait until `count` messages were delivered or `timeout` elapses
    pub async fn wait_for(&self, count: usize, timeout: std::time::Duration) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

#[async_trait::async_trait]
impl MailClient for MemoryMailClient {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("simulated delivery failure to {}", message.to);
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}
