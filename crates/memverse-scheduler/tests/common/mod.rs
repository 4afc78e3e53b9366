#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use memverse_core::error::Result as StoreResult;
use memverse_core::types::{
    DeliveryRecord, NewVerse, ProfileUpdate, Subscriber, SubscriberId, UserNote, Verse, VerseId,
    VerseNotification,
};
use memverse_core::{ManualClock, Notifier, NotifyError, Pace, SubscriberStore, VerseSource};
use memverse_scheduler::{
    notification_channel, DashboardResolver, DeliveryOrchestrator, LogNotifier,
    NotificationDispatcher, SweepConfig, SweepEngine,
};
use memverse_store::SqliteStore;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 7, 30, 0).unwrap()
}

pub struct Harness {
    pub store: SqliteStore,
    /// Engine-side subscriber store; `store` unless overridden.
    pub subscribers: Arc<dyn SubscriberStore>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: Arc<DeliveryOrchestrator>,
    pub resolver: DashboardResolver,
    pub dispatcher: Option<NotificationDispatcher>,
}

impl Harness {
    pub fn sweep(&self, interval: Duration) -> Arc<SweepEngine> {
        Arc::new(SweepEngine::new(
            Arc::clone(&self.subscribers),
            Arc::clone(&self.orchestrator),
            SweepConfig {
                interval,
                max_concurrent: 4,
            },
        ))
    }

    pub async fn history_len(&self, id: SubscriberId) -> usize {
        self.store.history(id).await.unwrap().len()
    }
}

pub async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let verses = [
        "John 3:16",
        "Psalm 23:1",
        "Romans 8:28",
        "Philippians 4:13",
        "Proverbs 3:5",
    ]
    .iter()
    .map(|r| NewVerse {
        reference: r.to_string(),
        text: format!("text of {r}"),
        translation: "KJV".into(),
    })
    .collect();
    store.import_verses(verses).await.unwrap();
    store
}

pub async fn harness() -> Harness {
    harness_with(
        seeded_store().await,
        None,
        Arc::new(LogNotifier::new("https://dash", "https://unsub")),
        Duration::from_secs(5),
    )
    .await
}

/// Build a harness; `overrides` replaces the store on the engine side.
pub async fn harness_with(
    store: SqliteStore,
    overrides: Option<(Arc<dyn SubscriberStore>, Arc<dyn VerseSource>)>,
    notifier: Arc<dyn Notifier>,
    io_timeout: Duration,
) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let (subscribers, verses) = match overrides {
        Some(pair) => pair,
        None => {
            let subscribers: Arc<dyn SubscriberStore> = Arc::new(store.clone());
            let verses: Arc<dyn VerseSource> = Arc::new(store.clone());
            (subscribers, verses)
        }
    };
    let (queue, dispatcher) = notification_channel(64, notifier);
    let orchestrator = Arc::new(DeliveryOrchestrator::new(
        Arc::clone(&subscribers),
        Arc::clone(&verses),
        clock.clone(),
        queue,
        io_timeout,
    ));
    let resolver =
        DashboardResolver::new(Arc::clone(&subscribers), verses, Arc::clone(&orchestrator));
    Harness {
        store,
        subscribers,
        clock,
        orchestrator,
        resolver,
        dispatcher: Some(dispatcher),
    }
}

pub async fn subscriber(store: &SqliteStore, email: &str, pace: Pace, translation: &str) -> SubscriberId {
    let sub = store.create_subscriber(email).await.unwrap();
    store
        .complete_profile(
            sub.id,
            ProfileUpdate {
                user_name: None,
                pace,
                translation: translation.into(),
            },
        )
        .await
        .unwrap();
    sub.id
}

/// Store wrapper that rewrites what the engine reads, to simulate rows the
/// public API refuses to produce (corrupt pace, marker without a log entry,
/// a slow or stalled backend).
pub struct Tampered {
    pub inner: SqliteStore,
    pub pace: Option<String>,
    pub marker: Option<DateTime<Utc>>,
    pub pick_delay: Option<Duration>,
    /// Delay before the write; the write still happens unless the call is dropped.
    pub commit_delay: Option<Duration>,
    pub list_delay: Option<Duration>,
    pub notes_delay: Option<Duration>,
}

async fn stall(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

impl Tampered {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            pace: None,
            marker: None,
            pick_delay: None,
            commit_delay: None,
            list_delay: None,
            notes_delay: None,
        }
    }

    /// Wire this wrapper in as both engine-side traits.
    pub fn into_overrides(self) -> Option<(Arc<dyn SubscriberStore>, Arc<dyn VerseSource>)> {
        let shared = Arc::new(self);
        let subscribers: Arc<dyn SubscriberStore> = shared.clone();
        let verses: Arc<dyn VerseSource> = shared;
        Some((subscribers, verses))
    }

    fn tamper(&self, mut s: Subscriber) -> Subscriber {
        if let Some(pace) = &self.pace {
            s.pace = pace.clone();
        }
        if let Some(marker) = self.marker {
            s.last_delivered_at = Some(marker);
        }
        s
    }
}

#[async_trait]
impl SubscriberStore for Tampered {
    async fn list_subscribers(&self) -> StoreResult<Vec<Subscriber>> {
        stall(self.list_delay).await;
        let subs = self.inner.list_subscribers().await?;
        Ok(subs.into_iter().map(|s| self.tamper(s)).collect())
    }

    async fn get_subscriber(&self, id: SubscriberId) -> StoreResult<Option<Subscriber>> {
        Ok(self.inner.get_subscriber(id).await?.map(|s| self.tamper(s)))
    }

    async fn commit_delivery(
        &self,
        id: SubscriberId,
        verse_id: VerseId,
        expected: Option<DateTime<Utc>>,
        new_marker: DateTime<Utc>,
    ) -> StoreResult<bool> {
        stall(self.commit_delay).await;
        self.inner.commit_delivery(id, verse_id, expected, new_marker).await
    }
}

#[async_trait]
impl VerseSource for Tampered {
    async fn pick_verse(&self, subscriber: SubscriberId, translation: &str) -> StoreResult<Verse> {
        stall(self.pick_delay).await;
        self.inner.pick_verse(subscriber, translation).await
    }

    async fn last_delivered(&self, subscriber: SubscriberId) -> StoreResult<Option<DeliveryRecord>> {
        self.inner.last_delivered(subscriber).await
    }

    async fn history(&self, subscriber: SubscriberId) -> StoreResult<Vec<DeliveryRecord>> {
        self.inner.history(subscriber).await
    }

    async fn notes(&self, subscriber: SubscriberId) -> StoreResult<Vec<UserNote>> {
        stall(self.notes_delay).await;
        self.inner.notes(subscriber).await
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _: &VerseNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }
}
