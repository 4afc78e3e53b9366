// Delivery decisions through the orchestrator and the dashboard resolver.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::*;
use memverse_core::Pace;
use memverse_scheduler::{DeliveryError, DeliveryOutcome, LogNotifier, Trigger};
use memverse_store::SqliteStore;

#[tokio::test]
async fn first_dashboard_read_delivers_and_marks() {
    let h = harness().await;
    let id = subscriber(&h.store, "daily@example.com", Pace::Daily, "KJV").await;

    let dash = h.resolver.resolve(id).await.unwrap();
    assert_eq!(dash.outcome, DeliveryOutcome::Delivered);
    assert_eq!(dash.subscriber.last_delivered_at, Some(t0()));
    assert_eq!(dash.history.len(), 1);
    assert_eq!(dash.history[0].verse.id, dash.verse.id);

    let stored = h.store.get_subscriber(id).await.unwrap().unwrap();
    assert_eq!(stored.last_delivered_at, Some(t0()));
}

#[tokio::test]
async fn daily_read_within_window_returns_same_verse() {
    let h = harness().await;
    let id = subscriber(&h.store, "daily@example.com", Pace::Daily, "KJV").await;

    let first = h.resolver.resolve(id).await.unwrap();
    h.clock.advance(ChronoDuration::hours(23));
    let second = h.resolver.resolve(id).await.unwrap();

    assert_eq!(second.outcome, DeliveryOutcome::AlreadyDelivered);
    assert_eq!(second.verse.id, first.verse.id);
    assert_eq!(h.history_len(id).await, 1);
}

#[tokio::test]
async fn daily_read_after_24h_delivers_again() {
    let h = harness().await;
    let id = subscriber(&h.store, "daily@example.com", Pace::Daily, "KJV").await;

    h.resolver.resolve(id).await.unwrap();
    h.clock.advance(ChronoDuration::hours(24));
    let next = h.resolver.resolve(id).await.unwrap();

    assert_eq!(next.outcome, DeliveryOutcome::Delivered);
    assert_eq!(next.history.len(), 2);
}

#[tokio::test]
async fn weekly_delivers_only_after_a_week() {
    let h = harness().await;
    let id = subscriber(&h.store, "weekly@example.com", Pace::Weekly, "KJV").await;

    h.resolver.resolve(id).await.unwrap();
    h.clock.advance(ChronoDuration::hours(167));
    assert_eq!(
        h.resolver.resolve(id).await.unwrap().outcome,
        DeliveryOutcome::AlreadyDelivered
    );

    h.clock.set(t0() + ChronoDuration::hours(169));
    let dash = h.resolver.resolve(id).await.unwrap();
    assert_eq!(dash.outcome, DeliveryOutcome::Delivered);
    assert_eq!(dash.subscriber.last_delivered_at, Some(t0() + ChronoDuration::hours(169)));
    assert_eq!(h.history_len(id).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_commit_exactly_once() {
    let h = harness().await;
    let id = subscriber(&h.store, "race@example.com", Pace::Daily, "KJV").await;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let orchestrator = Arc::clone(&h.orchestrator);
        tasks.push(tokio::spawn(async move {
            orchestrator.deliver(id, Trigger::OnDemand).await
        }));
    }

    let mut results = Vec::new();
    for t in tasks {
        results.push(t.await.unwrap().unwrap());
    }

    let delivered = results
        .iter()
        .filter(|d| d.outcome == DeliveryOutcome::Delivered)
        .count();
    assert_eq!(delivered, 1);
    // Everyone else either lost the commit or read the marker after it moved.
    for loser in results.iter().filter(|d| d.outcome != DeliveryOutcome::Delivered) {
        assert!(
            matches!(
                loser.outcome,
                DeliveryOutcome::Superseded | DeliveryOutcome::AlreadyDelivered
            ),
            "unexpected outcome {:?}",
            loser.outcome
        );
    }

    let history = h.store.history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(results.iter().all(|d| d.verse.id == history[0].verse.id));
    assert!(results.iter().all(|d| d.delivered_at == t0()));
}

#[tokio::test]
async fn incomplete_profile_is_reported_before_eligibility() {
    let h = harness().await;
    let sub = h.store.create_subscriber("new@example.com").await.unwrap();

    let err = h.resolver.resolve(sub.id).await.unwrap_err();
    assert!(matches!(err, DeliveryError::ProfileIncomplete));
    assert!(err.is_user_actionable());

    // The orchestrator itself treats the same subscriber as not eligible.
    let err = h.orchestrator.deliver(sub.id, Trigger::OnDemand).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NotEligible { .. }));
}

#[tokio::test]
async fn unknown_subscriber_is_not_eligible() {
    let h = harness().await;
    let err = h.resolver.resolve(404).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NotEligible { id: 404 }));
}

#[tokio::test]
async fn invalid_pace_is_rejected_without_delivering() {
    let store = seeded_store().await;
    let id = subscriber(&store, "odd@example.com", Pace::Daily, "KJV").await;
    let mut tampered = Tampered::new(store.clone());
    tampered.pace = Some("monthly".into());
    let h = harness_with(
        store,
        tampered.into_overrides(),
        Arc::new(FailingNotifier),
        Duration::from_secs(5),
    )
    .await;

    let err = h.resolver.resolve(id).await.unwrap_err();
    assert!(matches!(err, DeliveryError::InvalidPace(ref p) if p == "monthly"));
    assert!(err.is_user_actionable());
    assert_eq!(h.history_len(id).await, 0);
}

#[tokio::test]
async fn translation_without_content_fails() {
    let h = harness().await;
    let id = subscriber(&h.store, "niv@example.com", Pace::Daily, "NIV").await;

    let err = h.resolver.resolve(id).await.unwrap_err();
    assert!(
        matches!(err, DeliveryError::NoContentForTranslation { ref translation } if translation == "NIV")
    );
    assert!(!err.is_user_actionable());
    assert_eq!(h.store.get_subscriber(id).await.unwrap().unwrap().last_delivered_at, None);
}

#[tokio::test]
async fn marker_without_log_entry_is_no_artifact() {
    let store = seeded_store().await;
    let id = subscriber(&store, "ghost@example.com", Pace::Daily, "KJV").await;
    let mut tampered = Tampered::new(store.clone());
    tampered.marker = Some(t0() - ChronoDuration::hours(1));
    let h = harness_with(
        store,
        tampered.into_overrides(),
        Arc::new(FailingNotifier),
        Duration::from_secs(5),
    )
    .await;

    let err = h.orchestrator.deliver(id, Trigger::OnDemand).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NoArtifactAvailable { .. }));
}

#[tokio::test]
async fn notification_failure_does_not_undo_delivery() {
    let store = seeded_store().await;
    let mut h = harness_with(store, None, Arc::new(FailingNotifier), Duration::from_secs(5)).await;
    let id = subscriber(&h.store, "mail@example.com", Pace::Daily, "KJV").await;
    let dispatcher = h.dispatcher.take().unwrap();
    let drained = tokio::spawn(dispatcher.run());

    let delivery = h.orchestrator.deliver(id, Trigger::OnDemand).await.unwrap();
    assert_eq!(delivery.outcome, DeliveryOutcome::Delivered);

    // Dropping the orchestrators (the only queue producers) lets the dispatcher drain.
    drop(h.resolver);
    drop(h.orchestrator);
    let stats = drained.await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.sent, 0);
    assert_eq!(h.store.history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stalled_verse_source_times_out() {
    let store: SqliteStore = seeded_store().await;
    let id = subscriber(&store, "slow@example.com", Pace::Daily, "KJV").await;
    let mut tampered = Tampered::new(store.clone());
    tampered.pick_delay = Some(Duration::from_secs(30));
    let h = harness_with(
        store,
        tampered.into_overrides(),
        Arc::new(FailingNotifier),
        Duration::from_millis(50),
    )
    .await;

    let err = h.orchestrator.deliver(id, Trigger::OnDemand).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout { op: "pick_verse", .. }));
    assert_eq!(h.history_len(id).await, 0);
}

#[tokio::test]
async fn sweep_trigger_rejects_unsubscribed_but_dashboard_still_serves() {
    let h = harness().await;
    let id = subscriber(&h.store, "paused@example.com", Pace::Daily, "KJV").await;
    h.store.toggle_subscription(id).await.unwrap();

    let err = h.orchestrator.deliver(id, Trigger::Sweep).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NotEligible { .. }));

    let dash = h.resolver.resolve(id).await.unwrap();
    assert_eq!(dash.outcome, DeliveryOutcome::Delivered);
}

#[tokio::test]
async fn dashboard_includes_notes() {
    let h = harness().await;
    let id = subscriber(&h.store, "notes@example.com", Pace::Daily, "KJV").await;
    h.store.save_note(id, "John 3:16", "memorised").await.unwrap();

    let dash = h.resolver.resolve(id).await.unwrap();
    assert_eq!(dash.notes.len(), 1);
    assert_eq!(dash.notes[0].content, "memorised");
}

#[tokio::test]
async fn commit_landing_after_timeout_still_notifies() {
    let store = seeded_store().await;
    let id = subscriber(&store, "late@example.com", Pace::Daily, "KJV").await;
    let mut tampered = Tampered::new(store.clone());
    tampered.commit_delay = Some(Duration::from_millis(150));
    let mut h = harness_with(
        store,
        tampered.into_overrides(),
        Arc::new(LogNotifier::new("https://dash", "https://unsub")),
        Duration::from_millis(50),
    )
    .await;
    let drained = tokio::spawn(h.dispatcher.take().unwrap().run());

    let err = h.orchestrator.deliver(id, Trigger::OnDemand).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout { op: "commit_delivery", .. }));

    // The write was not abandoned: once it lands the window is closed.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.history_len(id).await, 1);
    let again = h.orchestrator.deliver(id, Trigger::OnDemand).await.unwrap();
    assert_eq!(again.outcome, DeliveryOutcome::AlreadyDelivered);

    drop(h.resolver);
    drop(h.orchestrator);
    let stats = tokio::time::timeout(Duration::from_secs(5), drained)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn stalled_notes_read_times_out_the_dashboard() {
    let store = seeded_store().await;
    let id = subscriber(&store, "slow-notes@example.com", Pace::Daily, "KJV").await;
    let mut tampered = Tampered::new(store.clone());
    tampered.notes_delay = Some(Duration::from_secs(30));
    let h = harness_with(
        store,
        tampered.into_overrides(),
        Arc::new(FailingNotifier),
        Duration::from_millis(50),
    )
    .await;

    let err = tokio::time::timeout(Duration::from_secs(5), h.resolver.resolve(id))
        .await
        .expect("resolve should be bounded by the io timeout")
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout { op: "notes", .. }));
    assert!(!err.is_user_actionable());
}
