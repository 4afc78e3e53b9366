use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection, Result, Row};

/// Initialise all tables for the delivery store. Safe to call on every
/// startup: CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_subscribers_table(conn)?;
    create_verses_table(conn)?;
    create_deliveries_table(conn)?;
    create_notes_table(conn)?;
    create_favourites_table(conn)?;
    Ok(())
}

fn create_subscribers_table(conn: &Connection) -> Result<()> {
    // verse_pace stays free text; the engine rejects unknown values at
    // decision time instead of the schema coercing them.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscribers (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            email               TEXT    NOT NULL UNIQUE,
            user_name           TEXT,
            verse_pace          TEXT    NOT NULL DEFAULT '',
            translation         TEXT,
            profile_completed   INTEGER NOT NULL DEFAULT 0,
            subscribed          INTEGER NOT NULL DEFAULT 1,
            last_delivered_at   TEXT,               -- RFC 3339 (micros) or NULL
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL
        );",
    )
}

fn create_verses_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS verses (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            reference   TEXT NOT NULL,
            body        TEXT NOT NULL,
            translation TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(reference, translation)
        );
        CREATE INDEX IF NOT EXISTS idx_verses_translation ON verses (translation);",
    )
}

fn create_deliveries_table(conn: &Connection) -> Result<()> {
    // Append-only. The newest row per subscriber mirrors
    // subscribers.last_delivered_at; both are written in one transaction.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS deliveries (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            subscriber_id   INTEGER NOT NULL REFERENCES subscribers(id),
            verse_id        INTEGER NOT NULL REFERENCES verses(id),
            delivered_at    TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deliveries_subscriber
            ON deliveries (subscriber_id, delivered_at);",
    )
}

fn create_notes_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            subscriber_id   INTEGER NOT NULL REFERENCES subscribers(id),
            verse_reference TEXT    NOT NULL,
            content         TEXT    NOT NULL,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notes_subscriber ON notes (subscriber_id);",
    )
}

fn create_favourites_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS favourites (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            subscriber_id   INTEGER NOT NULL REFERENCES subscribers(id),
            verse_id        INTEGER NOT NULL REFERENCES verses(id),
            created_at      TEXT    NOT NULL,
            UNIQUE(subscriber_id, verse_id)
        );",
    )
}

/// Fixed-width UTC encoding: equal instants always produce equal strings
/// (the conditional commit compares them) and lexical order is time order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw, idx)
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(&raw, idx))
        .transpose()
}

fn parse_ts(raw: &str, idx: usize) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
