//! Application-wide error types.
//!
//! Every failure surfaced to a caller falls into one [`ErrorKind`]. Callers
//! branch on the kind; the message attached to the variant is meant for logs,
//! while [`AppError::public_message`] is what may be shown to an end user.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Error classification shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed identifier or unparseable input.
    Input,
    /// Business-rule violation (conservation, bad split, bad amount).
    Validation,
    /// Caller is not allowed to perform the operation.
    Authorization,
    /// Entity absent or soft-deleted.
    NotFound,
    /// Operation conflicts with current state (already completed, duplicate).
    Conflict,
    /// Operation not valid for this kind of entity.
    InvalidState,
    /// Persistence or unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Returns the stable error code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Input => "INPUT_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Access denied.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., already completed, duplicate member).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not valid in the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::Input,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Forbidden(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            _ => self.kind().code(),
        }
    }

    /// Returns the message safe to show to an end user.
    ///
    /// Authorization and internal failures are collapsed into generic text so
    /// that membership and storage details never leak.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Forbidden(_) => "access denied".to_string(),
            Self::Database(_) | Self::Internal(_) => "internal error".to_string(),
            Self::Input(msg)
            | Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::InvalidState(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
