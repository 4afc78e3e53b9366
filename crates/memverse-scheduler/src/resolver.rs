use std::sync::Arc;

use memverse_core::types::{DeliveryRecord, Subscriber, SubscriberId, UserNote, Verse};
use memverse_core::{SubscriberStore, VerseSource};
use serde::Serialize;
use tracing::debug;

use crate::error::{DeliveryError, Result};
use crate::orchestrator::{DeliveryOrchestrator, DeliveryOutcome};

/// Everything the dashboard shows for one subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(rename = "user")]
    pub subscriber: Subscriber,
    pub verse: Verse,
    pub outcome: DeliveryOutcome,
    pub notes: Vec<UserNote>,
    #[serde(rename = "verse_history")]
    pub history: Vec<DeliveryRecord>,
}

/// On-demand path: a dashboard read that may itself trigger the delivery.
pub struct DashboardResolver {
    subscribers: Arc<dyn SubscriberStore>,
    verses: Arc<dyn VerseSource>,
    orchestrator: Arc<DeliveryOrchestrator>,
}

impl DashboardResolver {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        verses: Arc<dyn VerseSource>,
        orchestrator: Arc<DeliveryOrchestrator>,
    ) -> Self {
        Self {
            subscribers,
            verses,
            orchestrator,
        }
    }

    /// Resolve the subscriber's current verse plus notes and history.
    ///
    /// Profile completeness and pace validity are checked before any
    /// eligibility decision so the user gets an actionable error.
    pub async fn resolve(&self, id: SubscriberId) -> Result<Dashboard> {
        let mut subscriber = self
            .orchestrator
            .io("get_subscriber", self.subscribers.get_subscriber(id))
            .await?
            .ok_or(DeliveryError::NotEligible { id })?;

        if !subscriber.is_profile_complete() {
            return Err(DeliveryError::ProfileIncomplete);
        }
        subscriber.pace().map_err(DeliveryError::InvalidPace)?;

        let delivery = self.orchestrator.deliver_to(&subscriber).await?;
        if delivery.outcome != DeliveryOutcome::AlreadyDelivered {
            subscriber.last_delivered_at = Some(delivery.delivered_at);
        }
        debug!(subscriber_id = id, outcome = ?delivery.outcome, "dashboard resolved");

        // Side data is read after the delivery so the history includes it.
        let (notes, history) = tokio::try_join!(
            self.orchestrator.io("notes", self.verses.notes(id)),
            self.orchestrator.io("history", self.verses.history(id)),
        )?;

        Ok(Dashboard {
            subscriber,
            verse: delivery.verse,
            outcome: delivery.outcome,
            notes,
            history,
        })
    }
}
