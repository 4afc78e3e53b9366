//! Bounded, observable notification dispatch.
//!
//! Committed deliveries are pushed onto a fixed-capacity queue with
//! `try_send`, so a slow mail transport can never hold up a delivery. A
//! single dispatcher task drains the queue and makes one attempt per
//! notification; overflow and transport failures are counted and logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use memverse_core::types::VerseNotification;
use memverse_core::{Notifier, NotifyError};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::DeliveryError;

#[derive(Debug, Default)]
pub struct NotifyStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`NotifyStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub sent: u64,
    pub failed: u64,
}

impl NotifyStats {
    pub fn snapshot(&self) -> NotifyStatsSnapshot {
        NotifyStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side. Clone freely; the dispatcher exits once every clone is dropped.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<VerseNotification>,
    stats: Arc<NotifyStats>,
}

impl NotificationQueue {
    /// Non-blocking enqueue. Returns `false` when the notification was dropped.
    pub fn enqueue(&self, notification: VerseNotification) -> bool {
        let subscriber_id = notification.subscriber_id;
        match self.tx.try_send(notification) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(subscriber_id, "notification queue full, notification dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(subscriber_id, "notification dispatcher stopped, notification dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> NotifyStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared counters that outlive the queue, for status reporting.
    pub fn stats_handle(&self) -> Arc<NotifyStats> {
        Arc::clone(&self.stats)
    }
}

/// Consumer side; run it on its own task.
pub struct NotificationDispatcher {
    rx: mpsc::Receiver<VerseNotification>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<NotifyStats>,
}

impl NotificationDispatcher {
    /// Deliver queued notifications until all producers are gone.
    pub async fn run(mut self) -> NotifyStatsSnapshot {
        info!("notification dispatcher started");
        while let Some(notification) = self.rx.recv().await {
            match self.notifier.notify(&notification).await {
                Ok(()) => {
                    self.stats.sent.fetch_add(1, Ordering::Relaxed);
                    debug!(subscriber_id = notification.subscriber_id, "notification sent");
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    let err = DeliveryError::from(e);
                    warn!(
                        subscriber_id = notification.subscriber_id,
                        code = err.code(),
                        "{err}"
                    );
                }
            }
        }
        let stats = self.stats.snapshot();
        info!(sent = stats.sent, failed = stats.failed, dropped = stats.dropped, "notification dispatcher drained");
        stats
    }
}

/// Build a queue of `capacity` slots feeding `notifier`.
pub fn notification_channel(
    capacity: usize,
    notifier: Arc<dyn Notifier>,
) -> (NotificationQueue, NotificationDispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(NotifyStats::default());
    (
        NotificationQueue {
            tx,
            stats: Arc::clone(&stats),
        },
        NotificationDispatcher {
            rx,
            notifier,
            stats,
        },
    )
}

/// Notifier that writes the rendered message to the log. Used when no mail
/// transport is configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from_name: String,
    dashboard_url: String,
    unsubscribe_url: String,
}

impl LogNotifier {
    pub fn new(dashboard_url: impl Into<String>, unsubscribe_url: impl Into<String>) -> Self {
        Self {
            from_name: "Memverse".into(),
            dashboard_url: dashboard_url.into(),
            unsubscribe_url: unsubscribe_url.into(),
        }
    }

    pub fn with_from_name(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = from_name.into();
        self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &VerseNotification) -> Result<(), NotifyError> {
        info!(
            subscriber_id = n.subscriber_id,
            from = %self.from_name,
            to = %n.email,
            subject = %n.subject(),
            body = %n.body(&self.dashboard_url, &self.unsubscribe_url),
            "verse notification"
        );
        Ok(())
    }
}
