use chrono::Utc;
use memverse_core::error::Result;
use memverse_core::types::{FavouriteVerse, SubscriberId, UserNote, VerseId};
use memverse_core::StoreError;
use tracing::info;

use crate::db::{fmt_ts, ts_col};
use crate::store::SqliteStore;
use crate::verses::{row_to_verse, VERSE_COLUMNS_SQL};

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserNote> {
    Ok(UserNote {
        id: row.get(0)?,
        verse_reference: row.get(1)?,
        content: row.get(2)?,
        created_at: ts_col(row, 3)?,
        updated_at: ts_col(row, 4)?,
    })
}

impl SqliteStore {
    pub async fn save_note(
        &self,
        subscriber: SubscriberId,
        verse_reference: &str,
        content: &str,
    ) -> Result<UserNote> {
        let verse_reference = verse_reference.trim().to_string();
        let content = content.to_string();
        self.call(move |conn| {
            let now = fmt_ts(Utc::now());
            conn.execute(
                "INSERT INTO notes (subscriber_id, verse_reference, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                rusqlite::params![subscriber, verse_reference, content, now],
            )?;
            let id = conn.last_insert_rowid();
            let note = conn.query_row(
                "SELECT id, verse_reference, content, created_at, updated_at
                 FROM notes WHERE id = ?1",
                [id],
                row_to_note,
            )?;
            Ok(note)
        })
        .await
    }

    /// Notes for one subscriber, newest first.
    pub async fn notes(&self, subscriber: SubscriberId) -> Result<Vec<UserNote>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, verse_reference, content, created_at, updated_at
                 FROM notes WHERE subscriber_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let notes = stmt
                .query_map([subscriber], row_to_note)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        })
        .await
    }

    /// Add the verse to the subscriber's favourites, or remove it if already
    /// there. Returns `true` when the verse is now a favourite.
    pub async fn toggle_favourite(&self, subscriber: SubscriberId, verse: VerseId) -> Result<bool> {
        self.call(move |conn| {
            let verse_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM verses WHERE id = ?1)",
                [verse],
                |row| row.get(0),
            )?;
            if !verse_exists {
                return Err(StoreError::not_found("verse", verse).into());
            }

            let removed = conn.execute(
                "DELETE FROM favourites WHERE subscriber_id = ?1 AND verse_id = ?2",
                rusqlite::params![subscriber, verse],
            )?;
            if removed > 0 {
                info!(subscriber_id = subscriber, verse_id = verse, "favourite removed");
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO favourites (subscriber_id, verse_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![subscriber, verse, fmt_ts(Utc::now())],
            )?;
            info!(subscriber_id = subscriber, verse_id = verse, "favourite added");
            Ok(true)
        })
        .await
    }

    pub async fn favourites(&self, subscriber: SubscriberId) -> Result<Vec<FavouriteVerse>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT fav.id, fav.subscriber_id, fav.verse_id, fav.created_at, {VERSE_COLUMNS_SQL}
                 FROM favourites fav
                 JOIN verses v ON v.id = fav.verse_id
                 WHERE fav.subscriber_id = ?1
                 ORDER BY fav.created_at DESC, fav.id DESC"
            ))?;
            let favourites = stmt
                .query_map([subscriber], |row| {
                    Ok(FavouriteVerse {
                        id: row.get(0)?,
                        subscriber_id: row.get(1)?,
                        verse_id: row.get(2)?,
                        created_at: ts_col(row, 3)?,
                        verse: row_to_verse(row, 4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(favourites)
        })
        .await
    }
}
