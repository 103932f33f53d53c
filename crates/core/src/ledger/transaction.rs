//! Transaction aggregate.
//!
//! A transaction is a header plus an ordered list of [`Entry`] lines. Expense
//! payers and settlement payers are `Paid` lines; expense splits and
//! settlement payees are `Owed` lines. Because both kinds of transaction share
//! this shape, one delta rule drives every ledger mutation: paid lines feed
//! `total_paid`, owed lines feed `total_owed`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_shared::types::{CurrencyCode, GroupId, TransactionId, UserId};

use super::balance::{BalanceDelta, deltas_for};
use super::types::{EntrySide, ParticipantRole, SplitType, TransactionStatus, TransactionType};

/// One paid or owed line of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// The member this line belongs to.
    pub user_id: UserId,
    /// Display name at the time the transaction was recorded.
    pub user_name: String,
    /// Which running total the line feeds.
    pub side: EntrySide,
    /// Positive amount.
    pub amount: Decimal,
}

impl Entry {
    /// Creates a paid line.
    #[must_use]
    pub fn paid(user_id: UserId, user_name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            side: EntrySide::Paid,
            amount,
        }
    }

    /// Creates an owed line.
    #[must_use]
    pub fn owed(user_id: UserId, user_name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            side: EntrySide::Owed,
            amount,
        }
    }
}

/// A member's net position in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// The member.
    pub user_id: UserId,
    /// Display name.
    pub user_name: String,
    /// Amount paid minus amount owed.
    pub net_amount: Decimal,
    /// How the member took part.
    pub role: ParticipantRole,
}

/// Completion metadata of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementDetails {
    /// When the settlement was confirmed.
    pub settled_at: DateTime<Utc>,
    /// How the money moved.
    pub method: Option<String>,
    /// Reference to a receipt.
    pub proof: Option<String>,
}

/// A recorded expense or settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Transaction id.
    pub id: TransactionId,
    /// Owning group.
    pub group_id: GroupId,
    /// Expense or settlement.
    pub transaction_type: TransactionType,
    /// What it was for.
    pub description: String,
    /// Total amount.
    pub amount: Decimal,
    /// Currency copied at creation.
    pub currency: CurrencyCode,
    /// When it happened.
    pub date: DateTime<Utc>,
    /// Split method for expenses.
    pub split_type: Option<SplitType>,
    /// Free-form category.
    pub category: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// Present once a settlement is completed through the engine.
    pub settlement: Option<SettlementDetails>,
    /// Who recorded it.
    pub created_by: UserId,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
    /// Last editor.
    pub updated_by: Option<UserId>,
    /// Paid and owed lines in input order.
    pub entries: Vec<Entry>,
}

impl Transaction {
    /// Returns the paid lines.
    pub fn payers(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.side == EntrySide::Paid)
    }

    /// Returns the owed lines.
    pub fn splits(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.side == EntrySide::Owed)
    }

    /// Sum of paid lines.
    #[must_use]
    pub fn paid_total(&self) -> Decimal {
        self.payers().map(|e| e.amount).sum()
    }

    /// Sum of owed lines.
    #[must_use]
    pub fn owed_total(&self) -> Decimal {
        self.splits().map(|e| e.amount).sum()
    }

    /// Returns true if paid and owed lines sum to the same amount.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.paid_total() == self.owed_total()
    }

    /// Returns true for settlements.
    #[must_use]
    pub fn is_settlement(&self) -> bool {
        self.transaction_type == TransactionType::Settlement
    }

    /// Returns true if `user_id` has a line in this transaction.
    #[must_use]
    pub fn involves(&self, user_id: UserId) -> bool {
        self.entries.iter().any(|e| e.user_id == user_id)
    }

    /// Derived per-member net positions, in first-appearance order.
    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        derive_participants(&self.entries, self.transaction_type)
    }

    /// Ledger deltas this transaction applies on creation.
    #[must_use]
    pub fn balance_deltas(&self) -> Vec<BalanceDelta> {
        deltas_for(&self.entries)
    }

    /// Ledger deltas that undo this transaction.
    #[must_use]
    pub fn reversal_deltas(&self) -> Vec<BalanceDelta> {
        self.balance_deltas()
            .iter()
            .map(BalanceDelta::reversed)
            .collect()
    }
}

/// Folds entries into one participant per member.
///
/// `net_amount` is paid minus owed. A member who only paid is a `Payer`, one
/// who only owes is a `Split` (a `Payee` in a settlement), and one who did
/// both is `Both`.
#[must_use]
pub fn derive_participants(entries: &[Entry], transaction_type: TransactionType) -> Vec<Participant> {
    struct Acc {
        user_id: UserId,
        user_name: String,
        paid: Decimal,
        owed: Decimal,
        has_paid: bool,
        has_owed: bool,
    }

    let mut accs: Vec<Acc> = Vec::new();
    for entry in entries {
        let idx = if let Some(idx) = accs.iter().position(|a| a.user_id == entry.user_id) {
            idx
        } else {
            accs.push(Acc {
                user_id: entry.user_id,
                user_name: entry.user_name.clone(),
                paid: Decimal::ZERO,
                owed: Decimal::ZERO,
                has_paid: false,
                has_owed: false,
            });
            accs.len() - 1
        };

        let acc = &mut accs[idx];
        match entry.side {
            EntrySide::Paid => {
                acc.paid += entry.amount;
                acc.has_paid = true;
            }
            EntrySide::Owed => {
                acc.owed += entry.amount;
                acc.has_owed = true;
            }
        }
    }

    accs.into_iter()
        .map(|acc| {
            let role = match (acc.has_paid, acc.has_owed) {
                (true, true) => ParticipantRole::Both,
                (true, false) => ParticipantRole::Payer,
                (false, _) if transaction_type == TransactionType::Settlement => {
                    ParticipantRole::Payee
                }
                (false, _) => ParticipantRole::Split,
            };
            Participant {
                user_id: acc.user_id,
                user_name: acc.user_name,
                net_amount: acc.paid - acc.owed,
                role,
            }
        })
        .collect()
}
