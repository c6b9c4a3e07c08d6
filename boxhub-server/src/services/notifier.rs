//! Notification Service - 邮件通知队列
//!
//! State changes commit first, then enqueue a message here. A single
//! background worker delivers each message with bounded retries and
//! exponential backoff. Enqueueing never fails the caller.

use std::time::Duration;

use tokio::sync::mpsc;

use super::mailer::{DynMailClient, EmailMessage};

/// Queue capacity before new messages are dropped (and logged)
const QUEUE_CAPACITY: usize = 1024;
const RETRY_MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempt counts from 1)
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(RETRY_MAX_DELAY_MS),
        )
    }
}

/// Handle for enqueueing outgoing mail
#[derive(Clone)]
pub struct NotificationService {
    tx: mpsc::Sender<EmailMessage>,
}

impl NotificationService {
    /// Spawn the delivery worker on the current runtime
    pub fn start(mailer: DynMailClient, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(run_worker(mailer, policy, rx));
        Self { tx }
    }

    /// Queue a message; delivery happens in the background
    pub fn enqueue(&self, message: EmailMessage) {
        let to = message.to.clone();
        let subject = message.subject.clone();
        match self.tx.try_send(message) {
            Ok(()) => tracing::debug!(to = %to, subject = %subject, "Email queued"),
            Err(e) => tracing::error!(to = %to, subject = %subject, error = %e, "Failed to queue email"),
        }
    }
}

async fn run_worker(mailer: DynMailClient, policy: RetryPolicy, mut rx: mpsc::Receiver<EmailMessage>) {
    tracing::info!(max_attempts = policy.max_attempts, "Notification worker started");
    while let Some(message) = rx.recv().await {
        deliver(&mailer, policy, message).await;
    }
    tracing::info!("Notification channel closed, shutting down worker");
}

async fn deliver(mailer: &DynMailClient, policy: RetryPolicy, message: EmailMessage) {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match mailer.send(message.clone()).await {
            Ok(()) => {
                tracing::info!(to = %message.to, subject = %message.subject, attempt, "Email delivered");
                return;
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    to = %message.to,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Email delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    to = %message.to,
                    subject = %message.subject,
                    attempts = max_attempts,
                    error = %e,
                    "Email delivery failed, giving up"
                );
            }
        }
    }
}
