use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memverse_core::types::{Subscriber, SubscriberId, Verse, VerseNotification};
use memverse_core::{Clock, Pace, StoreError, SubscriberStore, VerseSource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, Result};
use crate::notify::NotificationQueue;

/// Which call path asked for the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Periodic sweep. Re-checks the subscription flag before delivering.
    Sweep,
    /// Dashboard read. Subscription only governs pushes, not pulls.
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// This call committed a new delivery.
    Delivered,
    /// Not due; the last delivered verse was returned.
    AlreadyDelivered,
    /// Due, but a concurrent caller committed first; its verse was returned.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub verse: Verse,
    pub delivered_at: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
}

/// Single choke point for "deliver and mark".
///
/// Every new delivery goes through a conditional commit on the subscriber's
/// last-delivered marker, so concurrent callers that both judged the
/// subscriber due cannot both record a delivery.
pub struct DeliveryOrchestrator {
    subscribers: Arc<dyn SubscriberStore>,
    verses: Arc<dyn VerseSource>,
    clock: Arc<dyn Clock>,
    notifications: NotificationQueue,
    io_timeout: Duration,
}

impl DeliveryOrchestrator {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        verses: Arc<dyn VerseSource>,
        clock: Arc<dyn Clock>,
        notifications: NotificationQueue,
        io_timeout: Duration,
    ) -> Self {
        Self {
            subscribers,
            verses,
            clock,
            notifications,
            io_timeout,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Deliver to `id` if due, otherwise return what was last delivered.
    pub async fn deliver(&self, id: SubscriberId, trigger: Trigger) -> Result<Delivery> {
        let subscriber = self
            .io("get_subscriber", self.subscribers.get_subscriber(id))
            .await?
            .ok_or(DeliveryError::NotEligible { id })?;

        if !subscriber.is_profile_complete() {
            return Err(DeliveryError::NotEligible { id });
        }
        if trigger == Trigger::Sweep && !subscriber.subscribed {
            debug!(subscriber_id = id, "unsubscribed since listing, skipping");
            return Err(DeliveryError::NotEligible { id });
        }

        self.deliver_to(&subscriber).await
    }

    /// Steps after the subscriber has been loaded and validated by the
    /// caller. `subscriber.last_delivered_at` is the expected marker for the
    /// conditional commit, so it must be the value just read from storage.
    pub async fn deliver_to(&self, subscriber: &Subscriber) -> Result<Delivery> {
        let id = subscriber.id;
        let pace = subscriber.pace().map_err(DeliveryError::InvalidPace)?;
        let now = self.clock.now();

        if !pace.is_due(subscriber.last_delivered_at, now) {
            return self.last_delivery(id, DeliveryOutcome::AlreadyDelivered).await;
        }

        let translation = subscriber
            .translation
            .as_deref()
            .ok_or(DeliveryError::NotEligible { id })?;
        let verse = match self
            .io("pick_verse", self.verses.pick_verse(id, translation))
            .await
        {
            Ok(v) => v,
            Err(DeliveryError::Storage(e)) if e.is_not_found() => {
                return Err(DeliveryError::NoContentForTranslation {
                    translation: translation.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        match self.commit(subscriber, pace, &verse, now).await {
            Ok(()) => {}
            Err(DeliveryError::DeliveryConflict { .. }) => {
                debug!(subscriber_id = id, "lost delivery race, returning winner's verse");
                return self.last_delivery(id, DeliveryOutcome::Superseded).await;
            }
            Err(e) => return Err(e),
        }

        info!(subscriber_id = id, verse_id = verse.id, reference = %verse.reference, "verse delivered");
        self.notify(self.notification(subscriber, pace, &verse, now));

        Ok(Delivery {
            verse,
            delivered_at: now,
            outcome: DeliveryOutcome::Delivered,
        })
    }

    /// Conditional commit keyed on the marker observed at read time.
    ///
    /// The write runs on its own task. If it outlives the timeout the caller
    /// gets `Timeout`, but the write is not abandoned: should it still commit,
    /// the notification for that delivery is sent when it lands.
    async fn commit(
        &self,
        subscriber: &Subscriber,
        pace: Pace,
        verse: &Verse,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let subscribers = Arc::clone(&self.subscribers);
        let (id, verse_id, expected) = (subscriber.id, verse.id, subscriber.last_delivered_at);
        let mut write = tokio::spawn(async move {
            subscribers.commit_delivery(id, verse_id, expected, now).await
        });

        let committed = match tokio::time::timeout(self.io_timeout, &mut write).await {
            Ok(joined) => joined.map_err(|e| {
                DeliveryError::Storage(StoreError::Internal(format!("commit task failed: {e}")))
            })??,
            Err(_) => {
                let notification = self.notification(subscriber, pace, verse, now);
                let queue = self.notifications.clone();
                tokio::spawn(async move {
                    match write.await {
                        Ok(Ok(true)) => {
                            info!(subscriber_id = id, verse_id, "late commit landed, notifying");
                            queue.enqueue(notification);
                        }
                        Ok(Ok(false)) => debug!(subscriber_id = id, "late commit lost the race"),
                        Ok(Err(e)) => warn!(subscriber_id = id, "late commit failed: {e}"),
                        Err(e) => warn!(subscriber_id = id, "commit task failed: {e}"),
                    }
                });
                return Err(self.timeout("commit_delivery"));
            }
        };

        if committed {
            Ok(())
        } else {
            Err(DeliveryError::DeliveryConflict { id })
        }
    }

    async fn last_delivery(&self, id: SubscriberId, outcome: DeliveryOutcome) -> Result<Delivery> {
        let record = self
            .io("last_delivered", self.verses.last_delivered(id))
            .await?
            .ok_or(DeliveryError::NoArtifactAvailable { id })?;
        Ok(Delivery {
            verse: record.verse,
            delivered_at: record.delivered_at,
            outcome,
        })
    }

    fn notification(
        &self,
        subscriber: &Subscriber,
        pace: Pace,
        verse: &Verse,
        at: DateTime<Utc>,
    ) -> VerseNotification {
        VerseNotification {
            subscriber_id: subscriber.id,
            email: subscriber.email.clone(),
            user_name: subscriber.display_name().to_string(),
            pace,
            verse: verse.clone(),
            delivered_at: at,
        }
    }

    /// Best effort; the delivery is already committed whatever happens here.
    fn notify(&self, notification: VerseNotification) {
        let subscriber_id = notification.subscriber_id;
        if !self.notifications.enqueue(notification) {
            warn!(subscriber_id, "delivery committed without notification");
        }
    }

    fn timeout(&self, op: &'static str) -> DeliveryError {
        DeliveryError::Timeout {
            op,
            ms: self.io_timeout.as_millis() as u64,
        }
    }

    /// Bound a storage call by the configured timeout.
    pub(crate) async fn io<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(res) => res.map_err(DeliveryError::from),
            Err(_) => Err(self.timeout(op)),
        }
    }
}
