use thiserror::Error;

/// Errors raised by subscriber / verse storage backends.
///
/// Backends map their native error types into these variants so the engine
/// never needs to know which database sits behind the traits.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("invalid verse pace: {0}")]
    InvalidPace(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Failure reported by a [`crate::store::Notifier`] transport.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport could not be reached (SMTP down, socket closed, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport accepted the connection but refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
