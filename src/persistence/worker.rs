//! Hot/cold queue worker
//!
//! The hot path owns a [`QueueSender`] and only ever calls `enqueue`, which
//! never blocks: a full or closed queue drops the item and bumps a counter.
//! Exactly one consumer task per queue performs the external I/O through a
//! [`QueueHandler`]. Handler failures are logged and counted; the consumer
//! keeps draining.

use crate::error::{DiamondError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cold-path item handler
#[async_trait::async_trait]
pub trait QueueHandler<T: Send + 'static>: Send + Sync + 'static {
    async fn handle(&self, item: T) -> Result<()>;
}

/// Counters shared by the hot and cold side of one queue
#[derive(Debug, Default)]
pub struct WorkerStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Producer handle, cheap to clone
#[derive(Debug)]
pub struct QueueSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    stats: Arc<WorkerStats>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Hand an item to the cold path without waiting. Returns false if dropped.
    pub fn enqueue(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(queue = self.name, "queue full, dropping item");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(queue = self.name, "queue closed, dropping item");
                false
            }
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Bounded queue with a single consumer task
pub struct QueueWorker<T> {
    name: &'static str,
    sender: QueueSender<T>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> QueueWorker<T> {
    /// Spawn the consumer on the current tokio runtime
    pub fn spawn<H>(name: &'static str, capacity: usize, handler: H) -> Self
    where
        H: QueueHandler<T>,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(WorkerStats::default());

        let handle = tokio::spawn(consume(name, rx, stop_rx, Arc::new(handler), stats.clone()));
        info!(queue = name, capacity, "queue worker started");

        Self {
            name,
            sender: QueueSender { name, tx, stats },
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn sender(&self) -> QueueSender<T> {
        self.sender.clone()
    }

    pub fn enqueue(&self, item: T) -> bool {
        self.sender.enqueue(item)
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.sender.stats()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal stop, let the consumer drain what is buffered, and join.
    ///
    /// On timeout the consumer is aborted and the remaining items are lost.
    pub async fn shutdown(&self, timeout: Duration) -> Result<WorkerStatsSnapshot> {
        let _ = self.stop_tx.send(true);
        let handle = self.handle.lock().take();
        let Some(mut handle) = handle else {
            return Ok(self.stats());
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                let stats = self.stats();
                info!(
                    queue = self.name,
                    processed = stats.processed,
                    failed = stats.failed,
                    dropped = stats.dropped,
                    "queue worker stopped"
                );
                Ok(stats)
            }
            Ok(Err(e)) => {
                error!(queue = self.name, error = %e, "queue worker panicked");
                Err(DiamondError::QueueClosed(format!("{}: {}", self.name, e)))
            }
            Err(_) => {
                handle.abort();
                warn!(
                    queue = self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "queue worker drain timed out, aborting"
                );
                Err(DiamondError::Cancelled)
            }
        }
    }
}

impl<T> Drop for QueueWorker<T> {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn consume<T, H>(
    name: &'static str,
    mut rx: mpsc::Receiver<T>,
    mut stop_rx: watch::Receiver<bool>,
    handler: Arc<H>,
    stats: Arc<WorkerStats>,
) where
    T: Send + 'static,
    H: QueueHandler<T> + ?Sized,
{
    loop {
        tokio::select! {
            biased;
            item = rx.recv() => match item {
                Some(item) => process(name, handler.as_ref(), &stats, item).await,
                None => break,
            },
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    // refuse new items, then drain what is already buffered
    rx.close();
    while let Some(item) = rx.recv().await {
        process(name, handler.as_ref(), &stats, item).await;
    }
    debug!(queue = name, "queue consumer exited");
}

async fn process<T, H>(name: &'static str, handler: &H, stats: &WorkerStats, item: T)
where
    T: Send + 'static,
    H: QueueHandler<T> + ?Sized,
{
    match handler.handle(item).await {
        Ok(()) => {
            stats.processed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(queue = name, error = %e, "cold-path write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Collect(Arc<Mutex<Vec<u32>>>);

    #[async_trait::async_trait]
    impl QueueHandler<u32> for Collect {
        async fn handle(&self, item: u32) -> Result<()> {
            if item == 13 {
                return Err(DiamondError::Persistence("unlucky".into()));
            }
            self.0.lock().push(item);
            Ok(())
        }
    }

    struct Slow(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl QueueHandler<u32> for Slow {
        async fn handle(&self, _item: u32) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = QueueWorker::spawn("test", 16, Collect(seen.clone()));
        for i in [1, 13, 2, 3] {
            assert!(worker.enqueue(i));
        }
        let stats = worker.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_drops() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = QueueWorker::spawn("test", 4, Collect(seen.clone()));
        let sender = worker.sender();
        worker.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(!sender.enqueue(7));
        assert_eq!(sender.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let done = Arc::new(AtomicUsize::new(0));
        let worker = QueueWorker::spawn("slow", 1, Slow(done.clone()));
        let accepted = (0..10).filter(|i| worker.enqueue(*i)).count();
        assert!(accepted < 10);
        assert!(worker.stats().dropped > 0);

        let result = worker.shutdown(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(DiamondError::Cancelled)));
    }
}
