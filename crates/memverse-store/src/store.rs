use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memverse_core::error::Result;
use memverse_core::store::{SubscriberStore, VerseSource};
use memverse_core::types::{
    DeliveryRecord, Subscriber, SubscriberId, UserNote, Verse, VerseId,
};
use memverse_core::StoreError;
use rusqlite::Connection;

use crate::db::init_db;
use crate::error::DbResult;

/// SQLite-backed store shared by the sweep, the dashboard and the HTTP layer.
///
/// Cloning is cheap; all clones share one connection behind a mutex.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn).map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::new(conn)
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Internal("sqlite connection mutex poisoned".into()))?;
            f(&mut guard).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("store task failed: {e}")))?
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        SqliteStore::list_subscribers(self).await
    }

    async fn get_subscriber(&self, id: SubscriberId) -> Result<Option<Subscriber>> {
        SqliteStore::get_subscriber(self, id).await
    }

    async fn commit_delivery(
        &self,
        id: SubscriberId,
        verse_id: VerseId,
        expected: Option<DateTime<Utc>>,
        new_marker: DateTime<Utc>,
    ) -> Result<bool> {
        SqliteStore::commit_delivery(self, id, verse_id, expected, new_marker).await
    }
}

#[async_trait]
impl VerseSource for SqliteStore {
    async fn pick_verse(&self, subscriber: SubscriberId, translation: &str) -> Result<Verse> {
        SqliteStore::pick_verse(self, subscriber, translation).await
    }

    async fn last_delivered(&self, subscriber: SubscriberId) -> Result<Option<DeliveryRecord>> {
        SqliteStore::last_delivered(self, subscriber).await
    }

    async fn history(&self, subscriber: SubscriberId) -> Result<Vec<DeliveryRecord>> {
        SqliteStore::history(self, subscriber).await
    }

    async fn notes(&self, subscriber: SubscriberId) -> Result<Vec<UserNote>> {
        SqliteStore::notes(self, subscriber).await
    }
}
