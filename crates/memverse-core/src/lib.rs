//! `memverse-core`: shared types, pace policy and collaborator contracts.
//!
//! Everything the delivery engine and the storage layer agree on lives here:
//! the subscriber/verse data model, the [`pace::Pace`] cadence with its due-ness
//! rule, the injectable [`clock::Clock`], the async collaborator traits in
//! [`store`], and the figment-backed [`config::MemverseConfig`].

pub mod clock;
pub mod config;
pub mod error;
pub mod pace;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{NotifyError, StoreError};
pub use pace::Pace;
pub use store::{Notifier, SubscriberStore, VerseSource};
