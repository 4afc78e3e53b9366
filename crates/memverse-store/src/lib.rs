//! `memverse-store`: SQLite persistence for subscribers, verses and the
//! delivery log.
//!
//! [`SqliteStore`] implements the engine's `SubscriberStore` and `VerseSource`
//! traits and the CRUD the HTTP surface needs. Every call runs its SQL on the
//! blocking pool so slow queries never stall the async runtime.

pub mod db;
pub mod error;
mod notes;
mod store;
mod subscribers;
mod verses;

pub use store::SqliteStore;
