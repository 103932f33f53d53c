//! Transaction engine: the only writer of transactions and ledger rows.
//!
//! Every write runs as one database transaction: the transaction rows and
//! every ledger row it touches commit or roll back together. Ledger rows are
//! guarded by their version counter; a lost race rolls the unit back and
//! re-runs it up to `max_write_retries` times. Header writes and deletes are
//! guarded by the status they were validated against, so a completion and a
//! delete racing on one settlement cannot both succeed.
//!
//! Directory lookups (group, user names) happen before the database
//! transaction is opened, and all statements inside it go through the
//! transaction handle.

mod groups;
mod locks;
mod queries;
mod recalculation;

pub use groups::{CreateGroupInput, DEFAULT_CURRENCY, GroupService, UpdateGroupInput};
pub use locks::GroupLocks;
pub use queries::SettlementSuggestion;
pub use recalculation::{AuditReport, RecalculationSummary};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use splitledger_core::ledger::{
    BalanceDelta, CompleteSettlementInput, CreateExpenseInput, CreateSettlementInput,
    LedgerError, LedgerResult, LedgerService, SettlementRequest, Transaction,
    UpdateTransactionInput,
};
use splitledger_core::notification::{NotificationDispatcher, TracingNotifier, notifications_for};
use splitledger_core::ports::{GroupDirectory, GroupInfo, UserDirectory};
use splitledger_shared::ErrorKind;
use splitledger_shared::config::LedgerConfig;
use splitledger_shared::types::{CurrencyCode, GroupId, TransactionId, UserId};

use crate::error::db_err;
use crate::repositories::{
    BalanceRepository, BalanceWrite, GroupRepository, TransactionRepository, UserRepository,
};

/// Transaction engine.
#[derive(Clone)]
pub struct TransactionEngine {
    db: DatabaseConnection,
    groups: Arc<dyn GroupDirectory>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: LedgerConfig,
    locks: GroupLocks,
}

impl TransactionEngine {
    /// Creates an engine backed by the database's own group and user tables,
    /// logging notifications through `tracing`.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self {
            groups: Arc::new(GroupRepository::new(db.clone())),
            users: Arc::new(UserRepository::new(db.clone())),
            notifier: Arc::new(TracingNotifier),
            db,
            config,
            locks: GroupLocks::new(),
        }
    }

    /// Replaces the notification dispatcher.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Records an expense and applies it to the ledger.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound`, `NotGroupMember` for the creator, a
    /// validation error for malformed input, or `ConcurrentModification`
    /// once retries are exhausted.
    pub async fn create_expense(&self, input: CreateExpenseInput) -> LedgerResult<Transaction> {
        let group = self.groups.get_group(input.group_id).await?;
        LedgerService::ensure_member(&group, input.created_by)?;

        let participants = input
            .payers
            .iter()
            .map(|p| p.user_id)
            .chain(input.split.user_ids())
            .collect::<Vec<_>>();
        let names = self.display_names(&group, participants).await?;
        let txn = LedgerService::build_expense(&input, &group, name_lookup(&names), Utc::now())?;

        let _guard = self.locks.write_access(group.id).await;
        let batch = std::slice::from_ref(&txn);
        self.with_retry("create_expense", || self.persist_new(&group.currency, batch))
            .await?;

        tracing::info!(
            transaction_id = %txn.id,
            group_id = %group.id,
            amount = %txn.amount,
            "expense created"
        );
        self.dispatch_notifications(&group, &txn);
        Ok(txn)
    }

    /// Records a settlement and applies it to the ledger.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound`, `NotGroupMember`, `SelfSettlement`,
    /// `ParticipantNotMember`, an amount error, or `ConcurrentModification`.
    pub async fn create_settlement(
        &self,
        input: CreateSettlementInput,
    ) -> LedgerResult<Transaction> {
        let group = self.groups.get_group(input.group_id).await?;
        LedgerService::ensure_member(&group, input.created_by)?;

        let names = self
            .display_names(&group, [input.payer_id, input.payee_id])
            .await?;
        let txn =
            LedgerService::build_settlement(&input, &group, name_lookup(&names), Utc::now())?;

        let _guard = self.locks.write_access(group.id).await;
        let batch = std::slice::from_ref(&txn);
        self.with_retry("create_settlement", || self.persist_new(&group.currency, batch))
            .await?;

        tracing::info!(
            transaction_id = %txn.id,
            group_id = %group.id,
            payer_id = %input.payer_id,
            payee_id = %input.payee_id,
            amount = %txn.amount,
            "settlement created"
        );
        self.dispatch_notifications(&group, &txn);
        Ok(txn)
    }

    /// Records several settlements of one group in a single unit.
    ///
    /// Either every settlement is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` for the caller, `EmptyBatch`,
    /// `BatchTooLarge`, or the first settlement's validation error.
    pub async fn create_bulk_settlements(
        &self,
        group_id: GroupId,
        created_by: UserId,
        requests: Vec<SettlementRequest>,
        completed: bool,
    ) -> LedgerResult<Vec<Transaction>> {
        let group = self.groups.get_group(group_id).await?;
        LedgerService::ensure_member(&group, created_by)?;
        LedgerService::validate_batch(requests.len(), self.config.max_bulk_settlements)?;

        let names = self
            .display_names(
                &group,
                requests.iter().flat_map(|r| [r.payer_id, r.payee_id]),
            )
            .await?;
        let now = Utc::now();
        let txns = requests
            .into_iter()
            .map(|request| {
                let input = CreateSettlementInput {
                    group_id,
                    created_by,
                    payer_id: request.payer_id,
                    payee_id: request.payee_id,
                    amount: request.amount,
                    currency: None,
                    date: None,
                    notes: request.notes,
                    completed,
                };
                LedgerService::build_settlement(&input, &group, name_lookup(&names), now)
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let _guard = self.locks.write_access(group.id).await;
        self.with_retry("create_bulk_settlements", || {
            self.persist_new(&group.currency, &txns)
        })
        .await?;

        tracing::info!(group_id = %group.id, count = txns.len(), "bulk settlements created");
        for txn in &txns {
            self.dispatch_notifications(&group, txn);
        }
        Ok(txns)
    }

    /// Marks a pending settlement completed. The ledger is not touched.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound`, `NotASettlement`,
    /// `NotSettlementParty` or `AlreadyCompleted`.
    pub async fn mark_complete(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
        input: CompleteSettlementInput,
    ) -> LedgerResult<Transaction> {
        let mut txn = self.load(transaction_id).await?;
        let expected = txn.status;
        LedgerService::complete_settlement(&mut txn, user_id, &input, Utc::now())?;
        if !TransactionRepository::update_header(&self.db, &txn, expected).await? {
            let completed = LedgerError::AlreadyCompleted(txn.id);
            return Err(lost_status_race(&self.db, txn.id, completed).await);
        }

        tracing::info!(transaction_id = %txn.id, completed_by = %user_id, "settlement completed");
        Ok(txn)
    }

    /// Edits the descriptive fields of an expense.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound`, `NotGroupMember`, `NotEditable`,
    /// `NotCreator`, `CompletedImmutable`, `StructuralUpdate` or
    /// `EmptyUpdate`.
    pub async fn update_transaction(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
        input: UpdateTransactionInput,
    ) -> LedgerResult<Transaction> {
        let mut txn = self.load(transaction_id).await?;
        let group = self.groups.get_group(txn.group_id).await?;
        LedgerService::ensure_member(&group, user_id)?;
        let expected = txn.status;
        LedgerService::apply_update(&mut txn, user_id, &input, Utc::now())?;
        if !TransactionRepository::update_header(&self.db, &txn, expected).await? {
            let completed = LedgerError::CompletedImmutable {
                id: txn.id,
                action: "edited",
            };
            return Err(lost_status_race(&self.db, txn.id, completed).await);
        }

        tracing::info!(transaction_id = %txn.id, updated_by = %user_id, "transaction updated");
        Ok(txn)
    }

    /// Deletes a transaction and reverses its ledger contribution.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound`, `NotGroupMember`, `NotCreator`,
    /// `CompletedImmutable` or `ConcurrentModification`.
    pub async fn delete_transaction(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
    ) -> LedgerResult<()> {
        let txn = self.load(transaction_id).await?;
        let group = self.groups.get_group(txn.group_id).await?;
        LedgerService::ensure_member(&group, user_id)?;
        LedgerService::validate_can_delete(&txn, user_id)?;

        let _guard = self.locks.write_access(group.id).await;
        self.with_retry("delete_transaction", || {
            self.persist_delete(&group.currency, &txn)
        })
        .await?;

        tracing::info!(
            transaction_id = %txn.id,
            group_id = %group.id,
            deleted_by = %user_id,
            "transaction deleted"
        );
        Ok(())
    }

    async fn load(&self, transaction_id: TransactionId) -> LedgerResult<Transaction> {
        TransactionRepository::get(&self.db, transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// Looks up display names of the given users that belong to the group.
    ///
    /// Non-members are left out; building the transaction rejects them.
    async fn display_names(
        &self,
        group: &GroupInfo,
        user_ids: impl IntoIterator<Item = UserId>,
    ) -> LedgerResult<HashMap<UserId, String>> {
        let mut names = HashMap::new();
        for user_id in user_ids {
            if names.contains_key(&user_id) || !group.is_member(user_id) {
                continue;
            }
            let user = self.users.get_user(user_id).await?;
            names.insert(user_id, user.name);
        }
        Ok(names)
    }

    /// Runs one atomic unit, re-running it after lost optimistic-lock races.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut unit: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match unit().await {
                Err(err) if err.is_retryable() && attempt < self.config.max_write_retries => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %err, "write conflict, retrying");
                }
                Err(err) => {
                    if err.kind() == ErrorKind::Internal {
                        tracing::error!(operation, error = %err, "write failed");
                    }
                    return Err(err);
                }
                ok => return ok,
            }
        }
    }

    async fn persist_new(&self, currency: &CurrencyCode, txns: &[Transaction]) -> LedgerResult<()> {
        let db_txn = self.db.begin().await.map_err(db_err)?;
        for txn in txns {
            TransactionRepository::insert(&db_txn, txn).await?;
            apply_deltas(&db_txn, currency, txn, &txn.balance_deltas(), txn.created_at).await?;
        }
        db_txn.commit().await.map_err(db_err)
    }

    async fn persist_delete(&self, currency: &CurrencyCode, txn: &Transaction) -> LedgerResult<()> {
        let db_txn = self.db.begin().await.map_err(db_err)?;
        if !TransactionRepository::delete(&db_txn, txn.id, txn.status).await? {
            let completed = LedgerError::CompletedImmutable {
                id: txn.id,
                action: "deleted",
            };
            return Err(lost_status_race(&db_txn, txn.id, completed).await);
        }
        apply_deltas(&db_txn, currency, txn, &txn.reversal_deltas(), Utc::now()).await?;
        db_txn.commit().await.map_err(db_err)
    }

    fn dispatch_notifications(&self, group: &GroupInfo, txn: &Transaction) {
        for notification in notifications_for(txn, &group.name, self.config.notify_creator) {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                let user_id = notification.user_id;
                if let Err(e) = notifier.notify(notification).await {
                    tracing::warn!(user_id = %user_id, error = %e, "notification failed");
                }
            });
        }
    }
}

/// Applies one transaction's deltas to the ledger rows of its group.
async fn apply_deltas<C: ConnectionTrait>(
    conn: &C,
    currency: &CurrencyCode,
    txn: &Transaction,
    deltas: &[BalanceDelta],
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let write = BalanceWrite {
        group_id: txn.group_id,
        currency,
        transaction_id: txn.id,
        now,
    };
    for delta in deltas {
        let user_name = txn
            .entries
            .iter()
            .find(|e| e.user_id == delta.user_id)
            .map_or("", |e| e.user_name.as_str());
        BalanceRepository::upsert(conn, write, user_name, delta).await?;
    }
    Ok(())
}

/// Explains why a status-guarded write matched no row: the transaction is
/// gone, or another writer completed it first.
async fn lost_status_race<C: ConnectionTrait>(
    conn: &C,
    id: TransactionId,
    completed: LedgerError,
) -> LedgerError {
    match TransactionRepository::get(conn, id).await {
        Ok(None) => LedgerError::TransactionNotFound(id),
        Ok(Some(current)) if current.status.is_completed() => completed,
        Ok(Some(_)) => LedgerError::ConcurrentModification,
        Err(e) => e.into(),
    }
}

fn name_lookup(names: &HashMap<UserId, String>) -> impl Fn(UserId) -> String + '_ {
    |user_id| names.get(&user_id).cloned().unwrap_or_default()
}
