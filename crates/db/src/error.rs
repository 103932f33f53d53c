//! Repository error types.

use sea_orm::{DbErr, SqlErr};
use splitledger_core::ledger::LedgerError;
use splitledger_shared::types::{GroupId, UserId};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A balance row changed between read and write.
    #[error("Concurrent modification of balance for user {user_id} in group {group_id}")]
    ConcurrentModification {
        /// The group.
        group_id: GroupId,
        /// The member whose row raced.
        user_id: UserId,
    },

    /// A stored value could not be mapped back onto the domain.
    #[error("Corrupt {table} row {id}: {reason}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// Row id.
        id: Uuid,
        /// What failed to parse.
        reason: String,
    },
}

/// Result alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub(crate) fn corrupt(table: &'static str, id: Uuid, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            id,
            reason: reason.into(),
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Database(e.to_string()),
            RepositoryError::ConcurrentModification { .. } => Self::ConcurrentModification,
            RepositoryError::Corrupt { .. } => Self::Internal(err.to_string()),
        }
    }
}

/// Maps a raw database error into a ledger error.
pub(crate) fn db_err(err: DbErr) -> LedgerError {
    RepositoryError::Database(err).into()
}

/// Returns true if the error is a unique index violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
