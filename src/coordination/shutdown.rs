//! Graceful shutdown
//!
//! A single stop flag on a `watch` channel, shared by the replay loop and
//! every cold-path worker. OS signals trip it; callers then join each worker
//! with its own timeout.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Why shutdown was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM or Ctrl-C
    Signal,
    /// Feed exhausted or command finished
    Completed,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal => write!(f, "signal"),
            ShutdownReason::Completed => write!(f, "completed"),
        }
    }
}

/// Shared stop flag
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Request shutdown; later requests are ignored
    pub fn trigger(&self, reason: ShutdownReason) {
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            info!("Shutdown requested: {}", reason);
        } else {
            warn!("Shutdown already requested, ignoring duplicate: {}", reason);
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver side for async tasks
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownToken {
    pub fn is_triggered(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolve once shutdown is requested
    pub async fn wait(&mut self) -> ShutdownReason {
        loop {
            if let Some(reason) = *self.rx.borrow_and_update() {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                // sender gone, nothing left to wait for
                return ShutdownReason::Completed;
            }
        }
    }
}

/// Trip `shutdown` on SIGTERM or Ctrl-C
pub fn install_signal_handlers(shutdown: Arc<ShutdownSignal>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let on_term = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("Received SIGTERM");
                    on_term.trigger(ShutdownReason::Signal);
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                shutdown.trigger(ShutdownReason::Signal);
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reason_display() {
        assert_eq!(ShutdownReason::Signal.to_string(), "signal");
        assert_eq!(ShutdownReason::Completed.to_string(), "completed");
    }

    #[test]
    fn test_first_reason_wins() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_triggered());
        shutdown.trigger(ShutdownReason::Completed);
        shutdown.trigger(ShutdownReason::Signal);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Completed));
    }

    #[tokio::test]
    async fn test_token_wakes_waiters() {
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut token = shutdown.token();
        let waiter = tokio::spawn(async move { token.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger(ShutdownReason::Signal);
        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ShutdownReason::Signal);
    }

    #[tokio::test]
    async fn test_late_token_sees_trigger() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger(ShutdownReason::Completed);
        let mut token = shutdown.token();
        assert!(token.is_triggered());
        assert_eq!(token.wait().await, ShutdownReason::Completed);
    }
}
