use memverse_core::{NotifyError, StoreError};
use thiserror::Error;

/// Errors that can occur while deciding on or performing a delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Stored pace is neither `daily` nor `weekly`.
    #[error("invalid verse pace: {0}")]
    InvalidPace(String),

    /// Profile setup has not been finished (dashboard path).
    #[error("please complete your profile to receive memory verses")]
    ProfileIncomplete,

    /// Subscriber missing, unsubscribed (sweep path) or without a usable profile.
    #[error("subscriber {id} is not eligible for delivery")]
    NotEligible { id: i64 },

    #[error("no verses available for translation {translation}")]
    NoContentForTranslation { translation: String },

    /// Not due, yet nothing was ever delivered: marker and log disagree.
    #[error("no verse available for subscriber {id}")]
    NoArtifactAvailable { id: i64 },

    /// The conditional commit lost to a concurrent delivery. Recovered
    /// inside the orchestrator; never returned to callers.
    #[error("delivery for subscriber {id} was committed concurrently")]
    DeliveryConflict { id: i64 },

    /// Notification transport failed. Logged by the dispatcher only.
    #[error("notification failed: {0}")]
    NotificationFailed(#[from] NotifyError),

    #[error("{op} timed out after {ms}ms")]
    Timeout { op: &'static str, ms: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl DeliveryError {
    /// Short error code for logs and API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::InvalidPace(_) => "INVALID_PACE",
            DeliveryError::ProfileIncomplete => "PROFILE_INCOMPLETE",
            DeliveryError::NotEligible { .. } => "NOT_ELIGIBLE",
            DeliveryError::NoContentForTranslation { .. } => "NO_CONTENT_FOR_TRANSLATION",
            DeliveryError::NoArtifactAvailable { .. } => "NO_ARTIFACT_AVAILABLE",
            DeliveryError::DeliveryConflict { .. } => "DELIVERY_CONFLICT",
            DeliveryError::NotificationFailed(_) => "NOTIFICATION_FAILED",
            DeliveryError::Timeout { .. } => "TIMEOUT",
            DeliveryError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors the user can fix themselves; everything else is shown as a
    /// generic "try again later".
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            DeliveryError::ProfileIncomplete | DeliveryError::InvalidPace(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
