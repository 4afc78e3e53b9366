//! Collaborator contracts consumed by the delivery engine.
//!
//! The SQLite implementation lives in `memverse-store`; tests substitute
//! in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{NotifyError, Result};
use crate::types::{DeliveryRecord, Subscriber, SubscriberId, UserNote, Verse, VerseId, VerseNotification};

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Every subscriber with a pace on file, subscribed or not. The sweep
    /// filters on `subscribed` itself so skips are visible in its report.
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>>;

    async fn get_subscriber(&self, id: SubscriberId) -> Result<Option<Subscriber>>;

    /// Conditional commit: advance the last-delivered marker from `expected`
    /// to `new_marker` and append the delivery record, as one unit.
    ///
    /// Returns `Ok(false)` without writing anything when the stored marker no
    /// longer equals `expected` (another caller delivered first).
    async fn commit_delivery(
        &self,
        id: SubscriberId,
        verse_id: VerseId,
        expected: Option<DateTime<Utc>>,
        new_marker: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait VerseSource: Send + Sync {
    /// Random verse in `translation`, preferring ones this subscriber has not
    /// seen yet. Fails with `StoreError::NotFound` when the translation has
    /// no content at all.
    async fn pick_verse(&self, subscriber: SubscriberId, translation: &str) -> Result<Verse>;

    /// Most recent delivery for the subscriber, by timestamp.
    async fn last_delivered(&self, subscriber: SubscriberId) -> Result<Option<DeliveryRecord>>;

    /// Full delivery log, newest first.
    async fn history(&self, subscriber: SubscriberId) -> Result<Vec<DeliveryRecord>>;

    async fn notes(&self, subscriber: SubscriberId) -> Result<Vec<UserNote>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &VerseNotification) -> std::result::Result<(), NotifyError>;
}
