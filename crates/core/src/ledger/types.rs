//! Ledger domain types for transaction creation and mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use splitledger_shared::types::{CurrencyCode, GroupId, UserId};

/// Transaction type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Shared bill paid by one or more members and split among members.
    Expense,
    /// Direct transfer from one member to another.
    Settlement,
    /// Money returned to members. Recorded but not produced by the engine.
    Refund,
    /// Manual correction. Recorded but not produced by the engine.
    Adjustment,
}

impl TransactionType {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Settlement => "settlement",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "settlement" => Ok(Self::Settlement),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(format!("Unknown transaction type: {s}")),
        }
    }
}

/// How an expense total is divided among members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// Total divided evenly, leftover cents to the first recipients.
    Equal,
    /// Caller supplies every share.
    Exact,
    /// Caller supplies a percentage per recipient.
    Percentage,
}

impl SplitType {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Exact => "exact",
            Self::Percentage => "percentage",
        }
    }
}

impl std::str::FromStr for SplitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "exact" => Ok(Self::Exact),
            "percentage" => Ok(Self::Percentage),
            _ => Err(format!("Unknown split type: {s}")),
        }
    }
}

/// Transaction lifecycle state.
///
/// ```text
/// expense:    Open ──────────────────────► (deleted)
/// settlement: Pending ──► Completed
///                │
///                └──────────────────────► (deleted)
/// ```
///
/// Completed settlements can be neither edited nor deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Recorded expense, editable by its creator.
    Open,
    /// Settlement recorded but not yet confirmed.
    Pending,
    /// Confirmed; immutable.
    Completed,
}

impl TransactionStatus {
    /// Status a freshly created transaction starts in.
    #[must_use]
    pub const fn initial(transaction_type: TransactionType, completed: bool) -> Self {
        if completed {
            Self::Completed
        } else {
            match transaction_type {
                TransactionType::Settlement => Self::Pending,
                _ => Self::Open,
            }
        }
    }

    /// Returns true once the transaction has been completed.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown transaction status: {s}")),
        }
    }
}

/// Which running total a transaction line feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySide {
    /// Money the user put in (expense payer, settlement payer).
    Paid,
    /// Money the user is charged (split share, settlement payee).
    Owed,
}

impl EntrySide {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Owed => "owed",
        }
    }
}

impl std::str::FromStr for EntrySide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "owed" => Ok(Self::Owed),
            _ => Err(format!("Unknown entry side: {s}")),
        }
    }
}

/// A participant's role in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Only paid.
    Payer,
    /// Only owes a share.
    Split,
    /// Paid and owes a share.
    Both,
    /// Receives a settlement.
    Payee,
}

/// A payer and the amount they contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerInput {
    /// The paying member.
    pub user_id: UserId,
    /// Amount contributed.
    pub amount: Decimal,
}

/// A split recipient and their share value.
///
/// For exact splits `value` is an amount, for percentage splits it is a
/// percentage of the total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInput {
    /// The member who owes the share.
    pub user_id: UserId,
    /// Amount or percentage, depending on the split type.
    pub value: Decimal,
}

/// Raw split specification as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitSpec {
    /// Divide the total evenly between these members, in this order.
    Equal(Vec<UserId>),
    /// Explicit amount per member.
    Exact(Vec<ShareInput>),
    /// Percentage per member.
    Percentage(Vec<ShareInput>),
}

impl SplitSpec {
    /// Returns the split type tag.
    #[must_use]
    pub const fn split_type(&self) -> SplitType {
        match self {
            Self::Equal(_) => SplitType::Equal,
            Self::Exact(_) => SplitType::Exact,
            Self::Percentage(_) => SplitType::Percentage,
        }
    }

    /// Returns the recipients in input order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<UserId> {
        match self {
            Self::Equal(users) => users.clone(),
            Self::Exact(shares) | Self::Percentage(shares) => {
                shares.iter().map(|s| s.user_id).collect()
            }
        }
    }

    /// Returns true if no recipient is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Equal(users) => users.is_empty(),
            Self::Exact(shares) | Self::Percentage(shares) => shares.is_empty(),
        }
    }
}

/// Input for recording an expense.
#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    /// The group the expense belongs to.
    pub group_id: GroupId,
    /// The member recording it.
    pub created_by: UserId,
    /// What was paid for.
    pub description: String,
    /// Total amount.
    pub amount: Decimal,
    /// Currency; defaults to the group's currency.
    pub currency: Option<CurrencyCode>,
    /// When it happened; defaults to now.
    pub date: Option<DateTime<Utc>>,
    /// Who paid.
    pub payers: Vec<PayerInput>,
    /// Who owes what.
    pub split: SplitSpec,
    /// Free-form category label.
    pub category: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Record the expense as already completed.
    pub completed: bool,
}

/// Input for recording a settlement between two members.
#[derive(Debug, Clone)]
pub struct CreateSettlementInput {
    /// The group the settlement belongs to.
    pub group_id: GroupId,
    /// The member recording it.
    pub created_by: UserId,
    /// Member handing money over.
    pub payer_id: UserId,
    /// Member receiving it.
    pub payee_id: UserId,
    /// Amount transferred.
    pub amount: Decimal,
    /// Currency; defaults to the group's currency.
    pub currency: Option<CurrencyCode>,
    /// When it happened; defaults to now.
    pub date: Option<DateTime<Utc>>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Record the settlement as already completed.
    pub completed: bool,
}

/// One settlement of a bulk request; group and creator come from the request.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    /// Member handing money over.
    pub payer_id: UserId,
    /// Member receiving it.
    pub payee_id: UserId,
    /// Amount transferred.
    pub amount: Decimal,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Input for marking a settlement completed.
#[derive(Debug, Clone, Default)]
pub struct CompleteSettlementInput {
    /// Notes to replace the current ones with.
    pub notes: Option<String>,
    /// How the money moved (cash, bank transfer).
    pub method: Option<String>,
    /// Reference to a receipt or screenshot.
    pub proof: Option<String>,
}

/// Input for editing a transaction.
///
/// Only `description`, `category` and `notes` are editable. The structural
/// fields exist so a caller that sends them gets an explicit rejection rather
/// than a silent ignore.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransactionInput {
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New notes.
    pub notes: Option<String>,
    /// New total; accepted only if unchanged.
    pub amount: Option<Decimal>,
    /// New payers; always rejected.
    pub payers: Option<Vec<PayerInput>>,
    /// New split; always rejected.
    pub split: Option<SplitSpec>,
}

impl UpdateTransactionInput {
    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.category.is_none()
            && self.notes.is_none()
            && self.amount.is_none()
            && self.payers.is_none()
            && self.split.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[rstest]
    #[case(TransactionType::Expense, false, TransactionStatus::Open)]
    #[case(TransactionType::Settlement, false, TransactionStatus::Pending)]
    #[case(TransactionType::Expense, true, TransactionStatus::Completed)]
    #[case(TransactionType::Settlement, true, TransactionStatus::Completed)]
    #[case(TransactionType::Adjustment, false, TransactionStatus::Open)]
    fn test_initial_status(
        #[case] ty: TransactionType,
        #[case] completed: bool,
        #[case] expected: TransactionStatus,
    ) {
        assert_eq!(TransactionStatus::initial(ty, completed), expected);
    }

    #[test]
    fn test_transaction_type_round_trip() {
        for ty in [
            TransactionType::Expense,
            TransactionType::Settlement,
            TransactionType::Refund,
            TransactionType::Adjustment,
        ] {
            assert_eq!(TransactionType::from_str(ty.as_str()).unwrap(), ty);
        }
        assert_eq!(
            TransactionType::from_str(" Expense ").unwrap(),
            TransactionType::Expense
        );
        assert!(TransactionType::from_str("transfer").is_err());
    }

    #[test]
    fn test_split_type_parse() {
        assert_eq!(SplitType::from_str("PERCENTAGE").unwrap(), SplitType::Percentage);
        assert!(SplitType::from_str("shares").is_err());
    }

    #[test]
    fn test_split_spec_accessors() {
        let a = UserId::new();
        let b = UserId::new();
        let spec = SplitSpec::Exact(vec![
            ShareInput {
                user_id: a,
                value: dec!(10),
            },
            ShareInput {
                user_id: b,
                value: dec!(20),
            },
        ]);
        assert_eq!(spec.split_type(), SplitType::Exact);
        assert_eq!(spec.user_ids(), vec![a, b]);
        assert!(!spec.is_empty());
        assert!(SplitSpec::Equal(vec![]).is_empty());
    }

    #[test]
    fn test_update_input_is_empty() {
        assert!(UpdateTransactionInput::default().is_empty());
        let input = UpdateTransactionInput {
            notes: Some("dinner".into()),
            ..Default::default()
        };
        assert!(!input.is_empty());
    }
}
