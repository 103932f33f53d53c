//! Read paths: transactions, balances, debt suggestions and analytics.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_core::analytics::{DailyActivity, GroupAnalytics, UserAnalytics, balance_history};
use splitledger_core::ledger::{LedgerError, LedgerResult, LedgerService, Transaction};
use splitledger_core::settlement::DebtSimplifier;
use splitledger_shared::types::{
    CurrencyCode, GroupId, PageRequest, PageResponse, TransactionId, UserId,
};

use super::TransactionEngine;
use crate::repositories::{BalanceRepository, BalanceRow, TransactionFilter, TransactionRepository};

/// A suggested transfer with display names attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementSuggestion {
    /// Group.
    pub group_id: GroupId,
    /// Member who should pay.
    pub payer_id: UserId,
    /// Payer display name.
    pub payer_name: String,
    /// Member who should receive.
    pub payee_id: UserId,
    /// Payee display name.
    pub payee_name: String,
    /// Amount to transfer.
    pub amount: Decimal,
    /// Group currency.
    pub currency: CurrencyCode,
}

impl TransactionEngine {
    /// Loads a transaction visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` or `NotGroupMember`.
    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
        caller: UserId,
    ) -> LedgerResult<Transaction> {
        let txn = self.load(transaction_id).await?;
        self.ensure_member(txn.group_id, caller).await?;
        Ok(txn)
    }

    /// Pages through a group's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` if the caller cannot see the group.
    pub async fn list_group_transactions(
        &self,
        group_id: GroupId,
        caller: UserId,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> LedgerResult<PageResponse<Transaction>> {
        self.ensure_member(group_id, caller).await?;
        Ok(TransactionRepository::page_by_group(&self.db, group_id, filter, page).await?)
    }

    /// Pages through every transaction the user takes part in, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_user_transactions(
        &self,
        user_id: UserId,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> LedgerResult<PageResponse<Transaction>> {
        Ok(TransactionRepository::page_by_user(&self.db, user_id, filter, page).await?)
    }

    /// Ledger rows of a group, ascending by user id.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` if the caller cannot see the group.
    pub async fn get_group_balances(
        &self,
        group_id: GroupId,
        caller: UserId,
    ) -> LedgerResult<Vec<BalanceRow>> {
        self.ensure_member(group_id, caller).await?;
        tracing::debug!(group_id = %group_id, "loading group balances");
        Ok(BalanceRepository::list_by_group(&self.db, group_id).await?)
    }

    /// Ledger rows of a user across groups.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn get_user_balances(&self, user_id: UserId) -> LedgerResult<Vec<BalanceRow>> {
        Ok(BalanceRepository::list_by_user(&self.db, user_id).await?)
    }

    /// Suggests transfers that settle the group's current balances.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `NotGroupMember`.
    pub async fn simplify_debts(
        &self,
        group_id: GroupId,
        caller: UserId,
    ) -> LedgerResult<Vec<SettlementSuggestion>> {
        let group = self.groups.get_group(group_id).await?;
        LedgerService::ensure_member(&group, caller)?;

        let rows = BalanceRepository::list_by_group(&self.db, group_id).await?;
        let name_of = |user_id: UserId| {
            rows.iter()
                .find(|r| r.user_id == user_id)
                .map(|r| r.user_name.clone())
                .unwrap_or_default()
        };

        let suggestions: Vec<SettlementSuggestion> =
            DebtSimplifier::simplify(rows.iter().map(|r| (r.user_id, r.balance)))
                .into_iter()
                .map(|t| SettlementSuggestion {
                    group_id,
                    payer_id: t.from_user,
                    payer_name: name_of(t.from_user),
                    payee_id: t.to_user,
                    payee_name: name_of(t.to_user),
                    amount: t.amount,
                    currency: group.currency.clone(),
                })
                .collect();

        tracing::debug!(group_id = %group_id, suggestions = suggestions.len(), "debts simplified");
        Ok(suggestions)
    }

    /// Activity summary of a group.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `NotGroupMember`.
    pub async fn group_analytics(
        &self,
        group_id: GroupId,
        caller: UserId,
    ) -> LedgerResult<GroupAnalytics> {
        let group = self.groups.get_group(group_id).await?;
        LedgerService::ensure_member(&group, caller)?;

        let txns =
            TransactionRepository::list_by_group(&self.db, group_id, TransactionFilter::default())
                .await?;
        let rows = BalanceRepository::list_by_group(&self.db, group_id).await?;

        Ok(GroupAnalytics::compute(
            group.id,
            &group.name,
            &group.currency,
            group.members.len(),
            &txns,
            rows.iter().map(|r| r.balance),
        ))
    }

    /// Activity summary of a user across groups.
    ///
    /// # Errors
    ///
    /// Returns `Database` if a query fails.
    pub async fn user_analytics(&self, user_id: UserId) -> LedgerResult<UserAnalytics> {
        let rows = BalanceRepository::list_by_user(&self.db, user_id).await?;
        let txns = TransactionRepository::list_by_user(&self.db, user_id).await?;
        let balances: Vec<Decimal> = rows.iter().map(|r| r.balance).collect();
        Ok(UserAnalytics::compute(user_id, &balances, &txns))
    }

    /// Transactions of the last `days` days grouped by calendar date.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` if the caller cannot see the group.
    pub async fn balance_history(
        &self,
        group_id: GroupId,
        caller: UserId,
        days: u32,
    ) -> LedgerResult<Vec<DailyActivity>> {
        self.ensure_member(group_id, caller).await?;
        let filter = TransactionFilter {
            transaction_type: None,
            since: Some(Utc::now() - Duration::days(i64::from(days))),
        };
        let txns = TransactionRepository::list_by_group(&self.db, group_id, filter).await?;
        Ok(balance_history(&txns))
    }

    /// Checks membership without revealing whether the group exists.
    async fn ensure_member(&self, group_id: GroupId, user_id: UserId) -> LedgerResult<()> {
        if self.groups.is_member(group_id, user_id).await? {
            Ok(())
        } else {
            Err(LedgerError::NotGroupMember { group_id, user_id })
        }
    }
}
