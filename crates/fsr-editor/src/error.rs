//! Error types for the editor session
//!
//! Provides error handling for:
//! - Persistence collaborator failures (not found, version conflict, transport)
//! - Local validation failures
//! - Illegal session state transitions
//! - Conversion into user-facing messages

use crate::state::{SessionEvent, SessionState};
use chrono::{DateTime, Utc};

/// Maximum length of the detail line of a user-facing error
pub const MAX_DETAIL_LEN: usize = 250;

/// Failures reported by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// No record with this id
    #[error("record not found: {0}")]
    NotFound(String),

    /// Server-side validation rejected the record
    #[error("validation rejected by server: {0}")]
    Validation(String),

    /// Stored version stamp is newer than the one the client started from
    #[error("version conflict: remote updated at {remote:?}, local copy from {local:?}")]
    VersionConflict {
        /// Stamp held by the server
        remote: Option<DateTime<Utc>>,
        /// Stamp the client sent
        local: Option<DateTime<Utc>>,
    },

    /// Network or server failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Check if this is a stale version stamp rejection
    #[inline]
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Illegal session state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Event not accepted in the current state
    #[error("illegal transition: {event:?} while {from:?}")]
    IllegalTransition {
        /// State the session was in
        from: SessionState,
        /// Rejected event
        event: SessionEvent,
    },
}

/// Main editor error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    /// Loading the record failed
    #[error("load failed: {0}")]
    Load(#[source] ServiceError),

    /// Saving the record failed
    #[error("save failed: {0}")]
    Save(#[source] ServiceError),

    /// Deleting the record failed
    #[error("delete failed: {0}")]
    Delete(#[source] ServiceError),

    /// Local form validation failed; never reaches the persistence layer
    #[error("form is invalid (first invalid tab: {first_invalid_tab:?})")]
    Validation {
        /// Tab holding the first invalid form
        first_invalid_tab: Option<usize>,
    },

    /// Pending asynchronous validation did not settle in time
    #[error("pending validation did not settle after {waited_ms}ms")]
    PendingTimeout {
        /// Time waited
        waited_ms: u64,
    },

    /// Operation not accepted in the current session state
    #[error(transparent)]
    State(#[from] StateError),

    /// Operation needs a loaded record
    #[error("no record loaded")]
    NotLoaded,

    /// Domain binding between forms and record failed
    #[error("invalid form value: {0}")]
    InvalidValue(String),
}

impl EditorError {
    /// Check if the underlying failure is a version conflict
    #[inline]
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        match self {
            Self::Save(e) | Self::Load(e) | Self::Delete(e) => e.is_version_conflict(),
            _ => false,
        }
    }

    /// Check if retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Save(e) | Self::Load(e) | Self::Delete(e) => e.is_retryable(),
            Self::PendingTimeout { .. } => true,
            _ => false,
        }
    }

    /// User-facing rendering of this error
    #[must_use]
    pub fn to_user_facing(&self) -> UserFacingError {
        let message = match self {
            Self::Load(_) => "Unable to load the data",
            Self::Save(ServiceError::VersionConflict { .. }) => {
                "The data was modified by someone else. Please reload before saving."
            }
            Self::Save(_) => "Unable to save the data",
            Self::Delete(_) => "Unable to delete the data",
            Self::Validation { .. } | Self::InvalidValue(_) => "The form contains errors",
            Self::PendingTimeout { .. } => "Validation is taking too long",
            Self::State(_) | Self::NotLoaded => "Operation not allowed now",
        };
        let details = match self {
            Self::Load(e) | Self::Save(e) | Self::Delete(e) => Some(e.to_string()),
            Self::InvalidValue(msg) => Some(msg.clone()),
            _ => None,
        };
        UserFacingError::new(message).with_details(details)
    }
}

/// Error message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    /// Main message
    pub message: String,
    /// Optional detail line, truncated
    pub details: Option<String>,
}

impl UserFacingError {
    /// Create error with message only
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attach a detail line, truncated to `MAX_DETAIL_LEN` characters
    #[must_use]
    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details
            .filter(|d| !d.is_empty())
            .map(|d| truncate_details(&d));
        self
    }
}

impl std::fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} ({})", self.message, details),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&EditorError> for UserFacingError {
    fn from(e: &EditorError) -> Self {
        e.to_user_facing()
    }
}

fn truncate_details(details: &str) -> String {
    if details.chars().count() <= MAX_DETAIL_LEN {
        return details.to_string();
    }
    let mut out: String = details.chars().take(MAX_DETAIL_LEN - 3).collect();
    out.push_str("...");
    out
}
