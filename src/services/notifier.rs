//! Operator alerts over a webhook
//!
//! Alerts are queued on the hot path and posted by a single cold-path worker.
//! Without a configured URL the service is a no-op.

use crate::error::{DiamondError, Result};
use crate::persistence::{QueueHandler, QueueWorker, WorkerStatsSnapshot};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook endpoint; alerts are disabled when unset
    pub webhook_url: Option<String>,
    pub queue_capacity: usize,
    pub request_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            queue_capacity: 256,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Success => "SUCCESS",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(level: AlertLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Success, title, message)
    }

    /// Plain-text body sent to the webhook
    pub fn text(&self) -> String {
        format!("[{}] {}\n{}", self.level, self.title, self.message)
    }
}

#[derive(Serialize)]
struct WebhookMessage {
    msg_type: &'static str,
    content: WebhookContent,
}

#[derive(Serialize)]
struct WebhookContent {
    text: String,
}

/// Cold-path handler posting alerts to a webhook
pub struct WebhookSink {
    client: Client,
    webhook_url: String,
}

impl WebhookSink {
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    #[instrument(skip(self, alert), fields(level = %alert.level))]
    pub async fn send(&self, alert: &Alert) -> Result<()> {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text: alert.text() },
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("webhook notification sent");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("webhook notification failed: {} - {}", status, body);
            Err(DiamondError::Notification(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait::async_trait]
impl QueueHandler<Alert> for WebhookSink {
    async fn handle(&self, item: Alert) -> Result<()> {
        self.send(&item).await
    }
}

/// Alert queue; disabled when no webhook is configured
pub struct NotificationService {
    worker: Option<QueueWorker<Alert>>,
}

impl NotificationService {
    /// Must be called inside a tokio runtime when a webhook URL is set
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let worker = match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                info!("webhook notifications enabled");
                let sink = WebhookSink::new(
                    url.to_string(),
                    Duration::from_secs(config.request_timeout_secs.max(1)),
                )?;
                Some(QueueWorker::spawn("notifications", config.queue_capacity, sink))
            }
            None => None,
        };
        Ok(Self { worker })
    }

    pub fn disabled() -> Self {
        Self { worker: None }
    }

    /// Route alerts through a custom handler
    pub fn with_handler<H: QueueHandler<Alert>>(capacity: usize, handler: H) -> Self {
        Self {
            worker: Some(QueueWorker::spawn("notifications", capacity, handler)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.worker.is_some()
    }

    /// Queue an alert; false when disabled or dropped
    pub fn notify(&self, alert: Alert) -> bool {
        match &self.worker {
            Some(worker) => worker.enqueue(alert),
            None => false,
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.worker
            .as_ref()
            .map(|w| w.stats())
            .unwrap_or_default()
    }

    pub async fn shutdown(&self, timeout: Duration) -> Result<WorkerStatsSnapshot> {
        match &self.worker {
            Some(worker) => worker.shutdown(timeout).await,
            None => Ok(WorkerStatsSnapshot::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Capture(Arc<Mutex<Vec<Alert>>>);

    #[async_trait::async_trait]
    impl QueueHandler<Alert> for Capture {
        async fn handle(&self, item: Alert) -> Result<()> {
            self.0.lock().push(item);
            Ok(())
        }
    }

    #[test]
    fn test_disabled_without_url() {
        let service = NotificationService::new(&NotificationConfig::default()).unwrap();
        assert!(!service.is_enabled());
        assert!(!service.notify(Alert::success("BET", "x")));
        assert_eq!(service.stats(), WorkerStatsSnapshot::default());
    }

    #[test]
    fn test_alert_text() {
        let alert = Alert::success("NYY @ BOS", "BET 500.00 at +120");
        assert_eq!(alert.text(), "[SUCCESS] NYY @ BOS\nBET 500.00 at +120");
        assert_eq!(
            serde_json::to_value(alert.level).unwrap(),
            serde_json::json!("SUCCESS")
        );
    }

    #[tokio::test]
    async fn test_alerts_delivered_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_handler(8, Capture(seen.clone()));
        assert!(service.notify(Alert::success("a", "1")));
        assert!(service.notify(Alert::new(AlertLevel::Warning, "b", "2")));
        let stats = service.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(stats.processed, 2);
        let titles: Vec<_> = seen.lock().iter().map(|a| a.title.clone()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
