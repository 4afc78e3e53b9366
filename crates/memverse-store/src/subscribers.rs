use chrono::{DateTime, Utc};
use memverse_core::error::Result;
use memverse_core::types::{ProfileUpdate, Subscriber, SubscriberId, VerseId};
use memverse_core::{Pace, StoreError};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::db::{fmt_ts, opt_ts_col, ts_col};
use crate::error::DbResult;
use crate::store::SqliteStore;

const SUBSCRIBER_SELECT_SQL: &str = "
    SELECT id, email, user_name, verse_pace, translation, profile_completed,
           subscribed, last_delivered_at, created_at, updated_at
    FROM subscribers";

/// Map a SELECT row (column order from SUBSCRIBER_SELECT_SQL) to a Subscriber.
fn row_to_subscriber(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        user_name: row.get(2)?,
        pace: row.get(3)?,
        translation: row.get(4)?,
        profile_completed: row.get::<_, i32>(5)? != 0,
        subscribed: row.get::<_, i32>(6)? != 0,
        last_delivered_at: opt_ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
    })
}

pub(crate) fn get_subscriber(conn: &Connection, id: SubscriberId) -> rusqlite::Result<Option<Subscriber>> {
    conn.query_row(
        &format!("{SUBSCRIBER_SELECT_SQL} WHERE id = ?1"),
        [id],
        row_to_subscriber,
    )
    .optional()
}

fn require_subscriber(conn: &Connection, id: SubscriberId) -> DbResult<Subscriber> {
    get_subscriber(conn, id)?.ok_or_else(|| StoreError::not_found("subscriber", id).into())
}

/// Append one row to the delivery log. Only called from inside the
/// conditional-commit transaction.
fn record_delivery(
    conn: &Connection,
    subscriber: SubscriberId,
    verse: VerseId,
    delivered_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO deliveries (subscriber_id, verse_id, delivered_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![subscriber, verse, delivered_at],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Create a bare account; profile fields are filled in later.
    pub async fn create_subscriber(&self, email: &str) -> Result<Subscriber> {
        let email = email.trim().to_lowercase();
        self.call(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM subscribers WHERE email = ?1)",
                [&email],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StoreError::AlreadyExists(email).into());
            }
            let now = fmt_ts(Utc::now());
            conn.execute(
                "INSERT INTO subscribers (email, created_at, updated_at) VALUES (?1, ?2, ?2)",
                rusqlite::params![email, now],
            )?;
            let id = conn.last_insert_rowid();
            info!(subscriber_id = id, "subscriber created");
            require_subscriber(conn, id)
        })
        .await
    }

    pub async fn get_subscriber(&self, id: SubscriberId) -> Result<Option<Subscriber>> {
        self.call(move |conn| Ok(get_subscriber(conn, id)?)).await
    }

    /// Every subscriber that has chosen a pace, subscribed or not.
    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.call(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{SUBSCRIBER_SELECT_SQL} WHERE verse_pace != '' ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([], row_to_subscriber)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            debug!(count = rows.len(), "listed subscribers");
            Ok(rows)
        })
        .await
    }

    /// Record the profile-setup answers and mark the profile complete.
    pub async fn complete_profile(&self, id: SubscriberId, update: ProfileUpdate) -> Result<Subscriber> {
        self.call(move |conn| {
            let now = fmt_ts(Utc::now());
            let n = conn.execute(
                "UPDATE subscribers
                 SET user_name = ?2, verse_pace = ?3, translation = ?4,
                     profile_completed = 1, updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.user_name,
                    update.pace.as_str(),
                    update.translation.trim(),
                    now
                ],
            )?;
            if n == 0 {
                return Err(StoreError::not_found("subscriber", id).into());
            }
            info!(subscriber_id = id, pace = %update.pace, "profile completed");
            require_subscriber(conn, id)
        })
        .await
    }

    /// Change the delivery pace. Unknown values are rejected, never defaulted.
    pub async fn set_pace(&self, id: SubscriberId, pace: &str) -> Result<Subscriber> {
        let pace: Pace = pace.parse().map_err(StoreError::InvalidPace)?;
        self.call(move |conn| {
            let now = fmt_ts(Utc::now());
            let n = conn.execute(
                "UPDATE subscribers SET verse_pace = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, pace.as_str(), now],
            )?;
            if n == 0 {
                return Err(StoreError::not_found("subscriber", id).into());
            }
            require_subscriber(conn, id)
        })
        .await
    }

    /// Flip the subscription flag and return the new value.
    pub async fn toggle_subscription(&self, id: SubscriberId) -> Result<bool> {
        self.call(move |conn| {
            let now = fmt_ts(Utc::now());
            let subscribed: Option<bool> = conn
                .query_row(
                    "UPDATE subscribers SET subscribed = 1 - subscribed, updated_at = ?2
                     WHERE id = ?1 RETURNING subscribed",
                    rusqlite::params![id, now],
                    |row| Ok(row.get::<_, i32>(0)? != 0),
                )
                .optional()?;
            let subscribed =
                subscribed.ok_or_else(|| StoreError::not_found("subscriber", id))?;
            info!(subscriber_id = id, subscribed, "subscription toggled");
            Ok(subscribed)
        })
        .await
    }

    /// Conditional commit of a delivery.
    ///
    /// The marker update only matches when the stored marker still equals
    /// `expected` (`IS` so that NULL compares equal to NULL). If no row
    /// changed the transaction is dropped, which rolls it back, and `false`
    /// is returned.
    pub async fn commit_delivery(
        &self,
        id: SubscriberId,
        verse_id: VerseId,
        expected: Option<DateTime<Utc>>,
        new_marker: DateTime<Utc>,
    ) -> Result<bool> {
        let expected = expected.map(fmt_ts);
        let new_marker = fmt_ts(new_marker);
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE subscribers SET last_delivered_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND last_delivered_at IS ?3",
                rusqlite::params![id, new_marker, expected],
            )?;
            if changed == 0 {
                debug!(subscriber_id = id, "conditional commit matched no row");
                return Ok(false);
            }
            record_delivery(&tx, id, verse_id, &new_marker)?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }
}
