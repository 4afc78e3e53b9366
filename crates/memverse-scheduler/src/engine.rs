use std::sync::Arc;
use std::time::Duration;

use memverse_core::types::Subscriber;
use memverse_core::SubscriberStore;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DeliveryError, Result};
use crate::orchestrator::{DeliveryOrchestrator, DeliveryOutcome, Trigger};

/// Sweep lifecycle: `Idle -> Running -> Idle`, `Stopped` once cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between ticks. The first tick fires one interval after start.
    pub interval: Duration,
    /// Deliveries allowed in flight at once within a tick.
    pub max_concurrent: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_concurrent: 16,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub considered: usize,
    pub unsubscribed: usize,
    pub not_due: usize,
    pub invalid_pace: usize,
    pub delivered: usize,
    /// Due by the marker, but another caller delivered in the meantime.
    pub already_delivered: usize,
    pub failed: usize,
}

/// Periodic sweep over every subscriber.
///
/// Due-ness is pre-checked from the listed marker only; the orchestrator
/// re-reads and re-checks before committing, so a stale listing can at worst
/// cost an extra read, never a duplicate delivery.
pub struct SweepEngine {
    subscribers: Arc<dyn SubscriberStore>,
    orchestrator: Arc<DeliveryOrchestrator>,
    config: SweepConfig,
    permits: Arc<Semaphore>,
    state: watch::Sender<SweepState>,
}

impl SweepEngine {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        orchestrator: Arc<DeliveryOrchestrator>,
        config: SweepConfig,
    ) -> Self {
        let (state, _) = watch::channel(SweepState::Idle);
        Self {
            subscribers,
            orchestrator,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            state,
        }
    }

    pub fn state(&self) -> SweepState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SweepState> {
        self.state.subscribe()
    }

    /// Main loop. Ticks every `interval` until `shutdown` broadcasts `true`
    /// or its sender is dropped.
    ///
    /// A tick that has started runs to completion (in-flight deliveries are
    /// not aborted); no new tick starts after cancellation.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.config.interval.as_secs_f64(), "verse sweep started");

        let mut interval =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(code = e.code(), "sweep tick error: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.state.send_replace(SweepState::Stopped);
        info!("verse sweep stopped");
    }

    /// Start [`SweepEngine::run`] on its own task.
    pub fn spawn(self: Arc<Self>) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SweepHandle { shutdown_tx, join }
    }

    /// One pass over all subscribers.
    pub async fn tick(&self) -> Result<SweepReport> {
        let sweep_id = Uuid::new_v4();
        self.state.send_replace(SweepState::Running);
        let result = self.sweep(sweep_id).await;
        // Never overwrite Stopped: run() owns that transition.
        self.state.send_if_modified(|s| {
            if *s == SweepState::Running {
                *s = SweepState::Idle;
                true
            } else {
                false
            }
        });
        result
    }

    async fn sweep(&self, sweep_id: Uuid) -> Result<SweepReport> {
        let subscribers = self
            .orchestrator
            .io("list_subscribers", self.subscribers.list_subscribers())
            .await?;
        let now = self.orchestrator.clock().now();
        let mut report = SweepReport {
            considered: subscribers.len(),
            ..SweepReport::default()
        };
        info!(%sweep_id, count = subscribers.len(), "sweep tick");

        let mut tasks = JoinSet::new();
        for subscriber in subscribers {
            if !subscriber.subscribed {
                debug!(%sweep_id, subscriber_id = subscriber.id, "skipping unsubscribed");
                report.unsubscribed += 1;
                continue;
            }
            match is_due_by_marker(&subscriber, now) {
                Ok(true) => {}
                Ok(false) => {
                    report.not_due += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%sweep_id, subscriber_id = subscriber.id, code = e.code(), "{e}");
                    report.invalid_pace += 1;
                    continue;
                }
            }

            let orchestrator = Arc::clone(&self.orchestrator);
            let permits = Arc::clone(&self.permits);
            let id = subscriber.id;
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is.
                let _permit = permits.acquire_owned().await.ok();
                (id, orchestrator.deliver(id, Trigger::Sweep).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(delivery))) => match delivery.outcome {
                    DeliveryOutcome::Delivered => report.delivered += 1,
                    DeliveryOutcome::AlreadyDelivered | DeliveryOutcome::Superseded => {
                        report.already_delivered += 1
                    }
                },
                Ok((id, Err(e))) => {
                    warn!(%sweep_id, subscriber_id = id, code = e.code(), "delivery failed: {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(%sweep_id, "delivery task panicked: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            %sweep_id,
            delivered = report.delivered,
            not_due = report.not_due,
            unsubscribed = report.unsubscribed,
            failed = report.failed,
            "sweep tick complete"
        );
        Ok(report)
    }
}

/// Cheap due check using only the listed row.
fn is_due_by_marker(subscriber: &Subscriber, now: chrono::DateTime<chrono::Utc>) -> Result<bool> {
    memverse_core::pace::is_due(&subscriber.pace, subscriber.last_delivered_at, now)
        .map_err(DeliveryError::InvalidPace)
}

/// Control surface for a spawned sweep.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal cancellation and wait for the loop (and any tick in progress)
    /// to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!("sweep task failed: {e}");
        }
    }
}
