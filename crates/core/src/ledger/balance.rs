//! Running balance arithmetic.
//!
//! The persisted ledger row for a (group, user) pair must always equal the
//! fold of every transaction's deltas for that user. This module owns the
//! delta rule and the fold, so incremental updates, deletions and full
//! recalculation all share one definition of "correct balance".

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_shared::types::UserId;

use super::transaction::{Entry, Transaction};
use super::types::EntrySide;
use crate::money::{approx_eq, is_negligible};

/// Running totals of one member in one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceTotals {
    /// Everything the member has paid.
    pub total_paid: Decimal,
    /// Everything the member has been charged.
    pub total_owed: Decimal,
}

impl BalanceTotals {
    /// Creates totals from raw values.
    #[must_use]
    pub const fn new(total_paid: Decimal, total_owed: Decimal) -> Self {
        Self {
            total_paid,
            total_owed,
        }
    }

    /// Net balance. Positive means the group owes this member.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.total_paid - self.total_owed
    }

    /// Applies a delta in place.
    pub fn apply(&mut self, delta: &BalanceDelta) {
        self.total_paid += delta.paid;
        self.total_owed += delta.owed;
    }

    /// Returns the totals after applying a delta.
    #[must_use]
    pub fn with(mut self, delta: &BalanceDelta) -> Self {
        self.apply(delta);
        self
    }

    /// Returns true if both totals are within tolerance of `other`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        approx_eq(self.total_paid, other.total_paid) && approx_eq(self.total_owed, other.total_owed)
    }
}

/// Change to one member's totals caused by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceDelta {
    /// The member.
    pub user_id: UserId,
    /// Change to `total_paid`.
    pub paid: Decimal,
    /// Change to `total_owed`.
    pub owed: Decimal,
}

impl BalanceDelta {
    /// Returns the delta that undoes this one.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            user_id: self.user_id,
            paid: -self.paid,
            owed: -self.owed,
        }
    }

    /// Change to the net balance.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.paid - self.owed
    }
}

/// Aggregates entries into one delta per member, in first-appearance order.
#[must_use]
pub fn deltas_for(entries: &[Entry]) -> Vec<BalanceDelta> {
    let mut deltas: Vec<BalanceDelta> = Vec::new();
    for entry in entries {
        let idx = if let Some(idx) = deltas.iter().position(|d| d.user_id == entry.user_id) {
            idx
        } else {
            deltas.push(BalanceDelta {
                user_id: entry.user_id,
                paid: Decimal::ZERO,
                owed: Decimal::ZERO,
            });
            deltas.len() - 1
        };
        match entry.side {
            EntrySide::Paid => deltas[idx].paid += entry.amount,
            EntrySide::Owed => deltas[idx].owed += entry.amount,
        }
    }
    deltas
}

/// Balances of a whole group keyed by member, ascending by user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    balances: BTreeMap<UserId, BalanceTotals>,
}

impl LedgerSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds balances from scratch by folding every transaction.
    ///
    /// Order does not matter: addition of deltas is commutative.
    #[must_use]
    pub fn replay<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut snapshot = Self::new();
        for txn in transactions {
            snapshot.apply_transaction(txn);
        }
        snapshot
    }

    /// Applies a transaction's creation deltas.
    pub fn apply_transaction(&mut self, txn: &Transaction) {
        for delta in txn.balance_deltas() {
            self.apply(&delta);
        }
    }

    /// Applies a transaction's reversal deltas.
    pub fn revert_transaction(&mut self, txn: &Transaction) {
        for delta in txn.reversal_deltas() {
            self.apply(&delta);
        }
    }

    /// Applies one delta, creating a zero row first if needed.
    pub fn apply(&mut self, delta: &BalanceDelta) {
        self.balances.entry(delta.user_id).or_default().apply(delta);
    }

    /// Inserts stored totals for a member.
    pub fn insert(&mut self, user_id: UserId, totals: BalanceTotals) {
        self.balances.insert(user_id, totals);
    }

    /// Totals for one member, if any transaction touched them.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<BalanceTotals> {
        self.balances.get(&user_id).copied()
    }

    /// Net balance for one member; zero if untouched.
    #[must_use]
    pub fn balance_of(&self, user_id: UserId) -> Decimal {
        self.get(user_id).map_or(Decimal::ZERO, |t| t.balance())
    }

    /// Iterates members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, BalanceTotals)> + '_ {
        self.balances.iter().map(|(id, totals)| (*id, *totals))
    }

    /// Sum of every member's net balance.
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.balances.values().map(BalanceTotals::balance).sum()
    }

    /// Returns true if the group's net balances sum to zero.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.total_balance().is_zero()
    }

    /// Number of members with a row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Returns true if no member has a row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Compares stored rows (`self`) against an expected snapshot.
    ///
    /// Members missing from one side are compared against zero totals; a
    /// missing row whose expected totals are zero is not drift.
    #[must_use]
    pub fn drift_against(&self, expected: &Self) -> Vec<BalanceDrift> {
        let mut users: Vec<UserId> = self.balances.keys().copied().collect();
        users.extend(expected.balances.keys().copied());
        users.sort_unstable();
        users.dedup();

        users
            .into_iter()
            .filter_map(|user_id| {
                let stored = self.get(user_id).unwrap_or_default();
                let wanted = expected.get(user_id).unwrap_or_default();
                if stored.approx_eq(&wanted) {
                    None
                } else {
                    Some(BalanceDrift {
                        user_id,
                        stored,
                        expected: wanted,
                    })
                }
            })
            .collect()
    }
}

/// A member whose stored totals differ from a full replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    /// The member.
    pub user_id: UserId,
    /// Totals on the stored row.
    pub stored: BalanceTotals,
    /// Totals a replay produces.
    pub expected: BalanceTotals,
}

impl BalanceDrift {
    /// Difference in net balance (stored minus expected).
    #[must_use]
    pub fn net_difference(&self) -> Decimal {
        self.stored.balance() - self.expected.balance()
    }

    /// Returns true if the net balances agree even though the totals differ.
    #[must_use]
    pub fn is_cosmetic(&self) -> bool {
        is_negligible(self.net_difference())
    }
}
