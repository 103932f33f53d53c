//! Recalculation and audit of a group's ledger.
//!
//! A full replay of the group's transactions through the same delta rule
//! used by incremental writes is the definition of a correct balance. The
//! audit compares stored rows against that replay; the recalculation
//! replaces the stored rows with it.

use chrono::Utc;
use sea_orm::TransactionTrait;
use serde::Serialize;
use splitledger_core::ledger::{BalanceDrift, LedgerResult, LedgerService, LedgerSnapshot};
use splitledger_core::ports::GroupInfo;
use splitledger_shared::types::{GroupId, UserId};

use super::{TransactionEngine, apply_deltas};
use crate::error::db_err;
use crate::repositories::{BalanceRepository, TransactionFilter, TransactionRepository};

/// Outcome of a recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalculationSummary {
    /// Group.
    pub group_id: GroupId,
    /// Transactions replayed.
    pub transactions_replayed: usize,
    /// Ledger rows removed before the replay.
    pub rows_removed: u64,
    /// Ledger rows present after the replay.
    pub rows_written: usize,
    /// Rows that differed from the replay before it ran.
    pub corrected: Vec<BalanceDrift>,
}

/// Outcome of an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Group.
    pub group_id: GroupId,
    /// Transactions replayed.
    pub transactions: usize,
    /// Rows that differ from the replay.
    pub drift: Vec<BalanceDrift>,
    /// Whether the stored rows cancel out.
    pub stored_conserved: bool,
}

impl AuditReport {
    /// Returns true if nothing needs repair.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty() && self.stored_conserved
    }
}

impl TransactionEngine {
    /// Rebuilds a group's ledger rows on behalf of a member.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound`, `NotGroupMember` or `Database`.
    pub async fn recalculate_group_balances(
        &self,
        group_id: GroupId,
        caller: UserId,
    ) -> LedgerResult<RecalculationSummary> {
        let group = self.groups.get_group(group_id).await?;
        LedgerService::ensure_member(&group, caller)?;
        self.rebuild(&group).await
    }

    /// Rebuilds a group's ledger rows without a caller, for operators.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `Database`.
    pub async fn repair_group_balances(&self, group_id: GroupId) -> LedgerResult<RecalculationSummary> {
        let group = self.groups.get_group(group_id).await?;
        self.rebuild(&group).await
    }

    /// Compares stored rows against a replay without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `Database`.
    pub async fn audit_group_balances(&self, group_id: GroupId) -> LedgerResult<AuditReport> {
        let group = self.groups.get_group(group_id).await?;
        let _guard = self.locks.exclusive(group.id).await;

        let txns =
            TransactionRepository::list_by_group(&self.db, group.id, TransactionFilter::default())
                .await?;
        let stored = BalanceRepository::snapshot(&self.db, group.id).await?;
        let expected = LedgerSnapshot::replay(&txns);

        let report = AuditReport {
            group_id: group.id,
            transactions: txns.len(),
            drift: stored.drift_against(&expected),
            stored_conserved: stored.is_conserved(),
        };
        if report.is_clean() {
            tracing::debug!(group_id = %group.id, transactions = report.transactions, "ledger clean");
        } else {
            tracing::warn!(
                group_id = %group.id,
                drifted = report.drift.len(),
                conserved = report.stored_conserved,
                "ledger drift detected"
            );
        }
        Ok(report)
    }

    /// Deletes every ledger row of the group and replays its transactions in
    /// date order, all in one database transaction, with writers excluded.
    async fn rebuild(&self, group: &GroupInfo) -> LedgerResult<RecalculationSummary> {
        let _guard = self.locks.exclusive(group.id).await;
        let db_txn = self.db.begin().await.map_err(db_err)?;

        let txns =
            TransactionRepository::list_by_group(&db_txn, group.id, TransactionFilter::default())
                .await?;
        let stored = BalanceRepository::snapshot(&db_txn, group.id).await?;
        let expected = LedgerSnapshot::replay(&txns);
        let corrected = stored.drift_against(&expected);

        let rows_removed = BalanceRepository::delete_all_by_group(&db_txn, group.id).await?;
        let now = Utc::now();
        for txn in &txns {
            apply_deltas(&db_txn, &group.currency, txn, &txn.balance_deltas(), now).await?;
        }
        db_txn.commit().await.map_err(db_err)?;

        let summary = RecalculationSummary {
            group_id: group.id,
            transactions_replayed: txns.len(),
            rows_removed,
            rows_written: expected.len(),
            corrected,
        };
        tracing::info!(
            group_id = %group.id,
            transactions = summary.transactions_replayed,
            corrected = summary.corrected.len(),
            "group balances recalculated"
        );
        Ok(summary)
    }
}
