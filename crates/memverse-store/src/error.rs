use memverse_core::StoreError;
use thiserror::Error;

/// Error type used inside blocking store closures, so both rusqlite failures
/// and domain failures propagate with `?`. Converted to [`StoreError`] at the
/// async boundary.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlite(e) => StoreError::Database(e.to_string()),
            DbError::Store(e) => e,
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
