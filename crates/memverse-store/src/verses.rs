use chrono::Utc;
use memverse_core::error::Result;
use memverse_core::types::{DeliveryRecord, NewVerse, SubscriberId, Verse};
use memverse_core::StoreError;
use rusqlite::OptionalExtension;
use tracing::{debug, info};

use crate::db::{fmt_ts, ts_col};
use crate::store::SqliteStore;

/// Verse columns plus the per-subscriber favourite flag. `?1` must bind the
/// subscriber id.
pub(crate) const VERSE_COLUMNS_SQL: &str = "
    v.id, v.reference, v.body, v.translation, v.created_at,
    EXISTS (SELECT 1 FROM favourites f WHERE f.subscriber_id = ?1 AND f.verse_id = v.id)";

/// Map the VERSE_COLUMNS_SQL block starting at column `offset`.
pub(crate) fn row_to_verse(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Verse> {
    Ok(Verse {
        id: row.get(offset)?,
        reference: row.get(offset + 1)?,
        text: row.get(offset + 2)?,
        translation: row.get(offset + 3)?,
        created_at: ts_col(row, offset + 4)?,
        is_favourite: row.get(offset + 5)?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeliveryRecord> {
    Ok(DeliveryRecord {
        subscriber_id: row.get(0)?,
        verse_id: row.get(1)?,
        delivered_at: ts_col(row, 2)?,
        verse: row_to_verse(row, 3)?,
    })
}

fn delivery_select_sql() -> String {
    format!(
        "SELECT d.subscriber_id, d.verse_id, d.delivered_at, {VERSE_COLUMNS_SQL}
         FROM deliveries d
         JOIN verses v ON v.id = d.verse_id
         WHERE d.subscriber_id = ?1
         ORDER BY d.delivered_at DESC, d.id DESC"
    )
}

impl SqliteStore {
    /// Random verse in `translation`; verses never delivered to this
    /// subscriber sort first, so repeats only happen once the pool is used up.
    pub async fn pick_verse(&self, subscriber: SubscriberId, translation: &str) -> Result<Verse> {
        let translation = translation.to_string();
        self.call(move |conn| {
            let verse = conn
                .query_row(
                    &format!(
                        "SELECT {VERSE_COLUMNS_SQL}
                         FROM verses v
                         WHERE v.translation = ?2
                         ORDER BY EXISTS (
                             SELECT 1 FROM deliveries d
                             WHERE d.subscriber_id = ?1 AND d.verse_id = v.id
                         ), RANDOM()
                         LIMIT 1"
                    ),
                    rusqlite::params![subscriber, translation],
                    |row| row_to_verse(row, 0),
                )
                .optional()?;
            match verse {
                Some(v) => Ok(v),
                None => Err(StoreError::not_found("translation", translation).into()),
            }
        })
        .await
    }

    pub async fn last_delivered(&self, subscriber: SubscriberId) -> Result<Option<DeliveryRecord>> {
        self.call(move |conn| {
            let record = conn
                .query_row(
                    &format!("{} LIMIT 1", delivery_select_sql()),
                    [subscriber],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Full delivery log for one subscriber, newest first.
    pub async fn history(&self, subscriber: SubscriberId) -> Result<Vec<DeliveryRecord>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(&delivery_select_sql())?;
            let rows = stmt
                .query_map([subscriber], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Any verse in `translation`, for the public verse-of-the-day read.
    pub async fn random_verse(&self, translation: &str) -> Result<Verse> {
        let translation = translation.to_string();
        self.call(move |conn| {
            // No subscriber context: bind 0 so the favourite flag is false.
            let verse = conn
                .query_row(
                    &format!(
                        "SELECT {VERSE_COLUMNS_SQL} FROM verses v
                         WHERE v.translation = ?2 ORDER BY RANDOM() LIMIT 1"
                    ),
                    rusqlite::params![0i64, translation],
                    |row| row_to_verse(row, 0),
                )
                .optional()?;
            verse.ok_or_else(|| StoreError::not_found("translation", translation).into())
        })
        .await
    }

    /// Insert verses, updating the text of any (reference, translation) pair
    /// already present. Returns the number of rows written.
    pub async fn import_verses(&self, verses: Vec<NewVerse>) -> Result<usize> {
        self.call(move |conn| {
            let now = fmt_ts(Utc::now());
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO verses (reference, body, translation, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(reference, translation) DO UPDATE SET body = excluded.body",
                )?;
                for verse in &verses {
                    if verse.reference.trim().is_empty() || verse.translation.trim().is_empty() {
                        debug!(reference = %verse.reference, "skipping verse with empty key");
                        continue;
                    }
                    written += stmt.execute(rusqlite::params![
                        verse.reference.trim(),
                        verse.text,
                        verse.translation.trim(),
                        now
                    ])?;
                }
            }
            tx.commit()?;
            info!(count = written, "verses imported");
            Ok(written)
        })
        .await
    }
}
