//! Ledger error types.
//!
//! Every variant maps onto one [`ErrorKind`] through [`LedgerError::kind`], so
//! callers branch on the category while logs keep the precise variant.

use rust_decimal::Decimal;
use splitledger_shared::types::{GroupId, TransactionId, UserId};
use splitledger_shared::{AppError, ErrorKind};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Input Errors ==========
    /// An identifier could not be parsed.
    #[error("Invalid {field}: {value:?}")]
    InvalidId {
        /// Which identifier was malformed.
        field: &'static str,
        /// The raw value supplied.
        value: String,
    },

    /// Currency code is not three letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    // ========== Validation Errors ==========
    /// Amount is below the minimum of 0.01.
    #[error("Amount must be at least 0.01, got {0}")]
    AmountTooSmall(Decimal),

    /// Amount has sub-cent precision.
    #[error("Amount {0} has more than 2 decimal places")]
    ExcessPrecision(Decimal),

    /// Description is empty or too long.
    #[error("Description must be between 1 and {max} characters")]
    InvalidDescription {
        /// Maximum accepted length.
        max: usize,
    },

    /// Group name is empty or too long.
    #[error("Group name must be between 1 and {max} characters")]
    InvalidGroupName {
        /// Maximum accepted length.
        max: usize,
    },

    /// Expense has no payers.
    #[error("Expense must have at least one payer")]
    NoPayers,

    /// Expense has no split recipients.
    #[error("Expense must be split between at least one member")]
    NoSplits,

    /// A user appears twice in the payer or split list.
    #[error("User {0} appears more than once")]
    DuplicateParticipant(UserId),

    /// A split share or percentage is negative.
    #[error("Share for user {0} cannot be negative")]
    NegativeShare(UserId),

    /// A percentage share exceeds 100.
    #[error("Percentage for user {0} cannot exceed 100")]
    PercentageOutOfRange(UserId),

    /// Payer amounts do not add up to the total.
    #[error("Payer amounts sum to {actual}, expected {expected}")]
    PayersMismatch {
        /// The transaction total.
        expected: Decimal,
        /// Sum of the payer amounts.
        actual: Decimal,
    },

    /// Split amounts do not add up to the total.
    #[error("Split amounts sum to {actual}, expected {expected}")]
    SplitsMismatch {
        /// The transaction total.
        expected: Decimal,
        /// Sum of the split amounts.
        actual: Decimal,
    },

    /// Split percentages do not add up to 100.
    #[error("Split percentages sum to {0}, expected 100")]
    PercentagesMismatch(Decimal),

    /// Paid and owed lines do not cancel out.
    #[error("Transaction is not balanced. Paid: {paid}, Owed: {owed}")]
    Unbalanced {
        /// Total of paid lines.
        paid: Decimal,
        /// Total of owed lines.
        owed: Decimal,
    },

    /// Settlement payer and payee are the same user.
    #[error("A user cannot settle with themselves")]
    SelfSettlement,

    /// A payer, split recipient or payee is not in the group.
    #[error("User {0} is not a member of this group")]
    ParticipantNotMember(UserId),

    /// Update request carries no fields.
    #[error("No fields to update")]
    EmptyUpdate,

    /// Update touches payers, splits or amount.
    #[error(
        "Unsupported update: payers, splits and amount cannot be edited; delete and recreate the transaction"
    )]
    StructuralUpdate,

    /// Bulk request is empty.
    #[error("At least one settlement is required")]
    EmptyBatch,

    /// Bulk request exceeds the configured limit.
    #[error("At most {max} settlements can be created at once, got {actual}")]
    BatchTooLarge {
        /// Configured limit.
        max: usize,
        /// Requested count.
        actual: usize,
    },

    // ========== Authorization Errors ==========
    /// Caller is not a member of the group.
    #[error("User {user_id} is not a member of group {group_id}")]
    NotGroupMember {
        /// The group.
        group_id: GroupId,
        /// The caller.
        user_id: UserId,
    },

    /// Only the creator may perform this action.
    #[error("Only the creator can {action}")]
    NotCreator {
        /// What was attempted.
        action: &'static str,
    },

    /// Only the payer or payee may complete a settlement.
    #[error("Only the payer or payee can complete settlement {0}")]
    NotSettlementParty(TransactionId),

    // ========== Not Found Errors ==========
    /// Group does not exist or was deleted.
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    /// Transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// User does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    // ========== Conflict Errors ==========
    /// Settlement is already completed.
    #[error("Settlement {0} is already completed")]
    AlreadyCompleted(TransactionId),

    /// Completed transactions are immutable.
    #[error("Completed transaction {id} cannot be {action}")]
    CompletedImmutable {
        /// The transaction.
        id: TransactionId,
        /// What was attempted ("deleted", "edited").
        action: &'static str,
    },

    /// User is already in the group.
    #[error("User {0} is already a member of this group")]
    AlreadyMember(UserId),

    /// The group creator cannot leave or be removed.
    #[error("The group creator cannot be removed")]
    CannotRemoveCreator,

    /// Email address already registered.
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Optimistic lock on a balance row lost a race.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Invalid State Errors ==========
    /// Operation only applies to settlements.
    #[error("Transaction {0} is not a settlement")]
    NotASettlement(TransactionId),

    /// Only expenses can be edited.
    #[error("Only expenses can be edited")]
    NotEditable,

    // ========== Internal Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidId { .. } | Self::InvalidCurrency(_) => ErrorKind::Input,

            Self::AmountTooSmall(_)
            | Self::ExcessPrecision(_)
            | Self::InvalidDescription { .. }
            | Self::InvalidGroupName { .. }
            | Self::NoPayers
            | Self::NoSplits
            | Self::DuplicateParticipant(_)
            | Self::NegativeShare(_)
            | Self::PercentageOutOfRange(_)
            | Self::PayersMismatch { .. }
            | Self::SplitsMismatch { .. }
            | Self::PercentagesMismatch(_)
            | Self::Unbalanced { .. }
            | Self::SelfSettlement
            | Self::ParticipantNotMember(_)
            | Self::EmptyUpdate
            | Self::StructuralUpdate
            | Self::EmptyBatch
            | Self::BatchTooLarge { .. } => ErrorKind::Validation,

            Self::NotGroupMember { .. } | Self::NotCreator { .. } | Self::NotSettlementParty(_) => {
                ErrorKind::Authorization
            }

            Self::GroupNotFound(_) | Self::TransactionNotFound(_) | Self::UserNotFound(_) => {
                ErrorKind::NotFound
            }

            Self::AlreadyCompleted(_)
            | Self::CompletedImmutable { .. }
            | Self::AlreadyMember(_)
            | Self::CannotRemoveCreator
            | Self::DuplicateEmail(_)
            | Self::ConcurrentModification => ErrorKind::Conflict,

            Self::NotASettlement(_) | Self::NotEditable => ErrorKind::InvalidState,

            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId { .. } => "INVALID_ID",
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
            Self::AmountTooSmall(_) => "AMOUNT_TOO_SMALL",
            Self::ExcessPrecision(_) => "EXCESS_PRECISION",
            Self::InvalidDescription { .. } => "INVALID_DESCRIPTION",
            Self::InvalidGroupName { .. } => "INVALID_GROUP_NAME",
            Self::NoPayers => "NO_PAYERS",
            Self::NoSplits => "NO_SPLITS",
            Self::DuplicateParticipant(_) => "DUPLICATE_PARTICIPANT",
            Self::NegativeShare(_) => "NEGATIVE_SHARE",
            Self::PercentageOutOfRange(_) => "PERCENTAGE_OUT_OF_RANGE",
            Self::PayersMismatch { .. } => "PAYERS_MISMATCH",
            Self::SplitsMismatch { .. } => "SPLITS_MISMATCH",
            Self::PercentagesMismatch(_) => "PERCENTAGES_MISMATCH",
            Self::Unbalanced { .. } => "UNBALANCED_TRANSACTION",
            Self::SelfSettlement => "SELF_SETTLEMENT",
            Self::ParticipantNotMember(_) => "PARTICIPANT_NOT_MEMBER",
            Self::EmptyUpdate => "EMPTY_UPDATE",
            Self::StructuralUpdate => "STRUCTURAL_UPDATE_UNSUPPORTED",
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            Self::NotGroupMember { .. } => "NOT_GROUP_MEMBER",
            Self::NotCreator { .. } => "NOT_CREATOR",
            Self::NotSettlementParty(_) => "NOT_SETTLEMENT_PARTY",
            Self::GroupNotFound(_) => "GROUP_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::AlreadyCompleted(_) => "ALREADY_COMPLETED",
            Self::CompletedImmutable { .. } => "COMPLETED_IMMUTABLE",
            Self::AlreadyMember(_) => "ALREADY_MEMBER",
            Self::CannotRemoveCreator => "CANNOT_REMOVE_CREATOR",
            Self::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::NotASettlement(_) => "NOT_A_SETTLEMENT",
            Self::NotEditable => "NOT_EDITABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }

    /// Returns the message safe to show to an end user.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Authorization => "access denied".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Input => Self::Input(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Authorization => Self::Forbidden(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::InvalidState => Self::InvalidState(message),
            ErrorKind::Internal => match err {
                LedgerError::Database(detail) => Self::Database(detail),
                _ => Self::Internal(message),
            },
        }
    }
}

/// Parses a raw identifier, mapping failures to [`LedgerError::InvalidId`].
///
/// # Errors
///
/// Returns `InvalidId` naming `field` when `raw` is not a valid UUID.
pub fn parse_id<T: std::str::FromStr>(field: &'static str, raw: &str) -> LedgerResult<T> {
    raw.trim().parse().map_err(|_| LedgerError::InvalidId {
        field,
        value: raw.to_string(),
    })
}
