//! `memverse-scheduler`: verse delivery scheduling engine.
//!
//! # Overview
//!
//! Two call paths can deliver a verse to the same subscriber:
//!
//! | Path                         | Entry point                          |
//! |------------------------------|--------------------------------------|
//! | Periodic sweep               | [`engine::SweepEngine::run`]         |
//! | Dashboard read (on demand)   | [`resolver::DashboardResolver::resolve`] |
//!
//! Both funnel through [`orchestrator::DeliveryOrchestrator`], which commits
//! a delivery only if the subscriber's last-delivered marker is unchanged
//! since it was read. The loser of a race returns the winner's verse, so each
//! due window yields at most one delivery.
//!
//! Notifications are handed to a bounded queue ([`notify`]) after commit and
//! never affect the delivery result.

pub mod engine;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod resolver;

pub use engine::{SweepConfig, SweepEngine, SweepHandle, SweepReport, SweepState};
pub use error::{DeliveryError, Result};
pub use notify::{
    notification_channel, LogNotifier, NotificationDispatcher, NotificationQueue, NotifyStats,
    NotifyStatsSnapshot,
};
pub use orchestrator::{Delivery, DeliveryOrchestrator, DeliveryOutcome, Trigger};
pub use resolver::{Dashboard, DashboardResolver};
