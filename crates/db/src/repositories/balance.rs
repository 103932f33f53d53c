//! Balance ledger repository.
//!
//! One row per (group, user). Rows are created lazily on the first
//! transaction that touches the member and are only ever removed in bulk,
//! by a group recalculation. Every write is a compare-and-swap on `version`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use splitledger_core::ledger::{BalanceDelta, BalanceTotals, LedgerSnapshot};
use splitledger_shared::types::{BalanceId, CurrencyCode, GroupId, TransactionId, UserId};

use super::{from_db_time, read_money, to_db_time};
use crate::entities::group_balances;
use crate::error::{RepositoryError, RepositoryResult, is_unique_violation};

/// A stored ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    /// Row id.
    pub id: BalanceId,
    /// Group.
    pub group_id: GroupId,
    /// Member.
    pub user_id: UserId,
    /// Member display name at the last write.
    pub user_name: String,
    /// Group currency.
    pub currency: CurrencyCode,
    /// Everything the member paid.
    pub total_paid: Decimal,
    /// Everything the member was charged.
    pub total_owed: Decimal,
    /// `total_paid - total_owed`.
    pub balance: Decimal,
    /// Last transaction applied to the row.
    pub last_transaction_id: Option<TransactionId>,
    /// Time of the last write.
    pub last_updated: DateTime<Utc>,
    /// Optimistic lock counter, starts at 1.
    pub version: i64,
}

impl BalanceRow {
    /// Running totals of the row.
    #[must_use]
    pub const fn totals(&self) -> BalanceTotals {
        BalanceTotals::new(self.total_paid, self.total_owed)
    }
}

/// Write-side parameters shared by every delta of one transaction.
#[derive(Debug, Clone, Copy)]
pub struct BalanceWrite<'a> {
    /// Group.
    pub group_id: GroupId,
    /// Group currency, stamped on new rows.
    pub currency: &'a CurrencyCode,
    /// Transaction that caused the write.
    pub transaction_id: TransactionId,
    /// Write time.
    pub now: DateTime<Utc>,
}

/// Balance ledger data access.
pub struct BalanceRepository;

impl BalanceRepository {
    /// Loads one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
        user_id: UserId,
    ) -> RepositoryResult<Option<BalanceRow>> {
        group_balances::Entity::find()
            .filter(group_balances::Column::GroupId.eq(group_id.into_inner()))
            .filter(group_balances::Column::UserId.eq(user_id.into_inner()))
            .one(conn)
            .await?
            .map(to_row)
            .transpose()
    }

    /// Applies a delta, creating a zero row first if needed.
    ///
    /// The update only lands if the row still carries the version that was
    /// read; otherwise, or if a concurrent insert won the unique index, a
    /// retryable `ConcurrentModification` is returned.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` on a lost race, `Database` otherwise.
    pub async fn upsert<C: ConnectionTrait>(
        conn: &C,
        write: BalanceWrite<'_>,
        user_name: &str,
        delta: &BalanceDelta,
    ) -> RepositoryResult<BalanceRow> {
        let raced = || RepositoryError::ConcurrentModification {
            group_id: write.group_id,
            user_id: delta.user_id,
        };
        let now = to_db_time(write.now);

        let Some(current) = Self::get(conn, write.group_id, delta.user_id).await? else {
            let totals = BalanceTotals::default().with(delta);
            let model = group_balances::ActiveModel {
                id: Set(BalanceId::new().into_inner()),
                group_id: Set(write.group_id.into_inner()),
                user_id: Set(delta.user_id.into_inner()),
                user_name: Set(user_name.to_string()),
                currency: Set(write.currency.as_str().to_string()),
                total_paid: Set(totals.total_paid),
                total_owed: Set(totals.total_owed),
                balance: Set(totals.balance()),
                last_transaction_id: Set(Some(write.transaction_id.into_inner())),
                last_updated: Set(now),
                version: Set(1),
            };
            return match model.insert(conn).await {
                Ok(model) => to_row(model),
                Err(e) if is_unique_violation(&e) => Err(raced()),
                Err(e) => Err(e.into()),
            };
        };

        let totals = current.totals().with(delta);
        let next_version = current.version + 1;
        let result = group_balances::Entity::update_many()
            .col_expr(group_balances::Column::TotalPaid, Expr::value(totals.total_paid))
            .col_expr(group_balances::Column::TotalOwed, Expr::value(totals.total_owed))
            .col_expr(group_balances::Column::Balance, Expr::value(totals.balance()))
            .col_expr(group_balances::Column::UserName, Expr::value(user_name))
            .col_expr(
                group_balances::Column::LastTransactionId,
                Expr::value(Some(write.transaction_id.into_inner())),
            )
            .col_expr(group_balances::Column::LastUpdated, Expr::value(now))
            .col_expr(group_balances::Column::Version, Expr::value(next_version))
            .filter(group_balances::Column::Id.eq(current.id.into_inner()))
            .filter(group_balances::Column::Version.eq(current.version))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(raced());
        }

        Ok(BalanceRow {
            user_name: user_name.to_string(),
            total_paid: totals.total_paid,
            total_owed: totals.total_owed,
            balance: totals.balance(),
            last_transaction_id: Some(write.transaction_id),
            last_updated: write.now,
            version: next_version,
            ..current
        })
    }

    /// Lists a group's rows, ascending by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_by_group<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
    ) -> RepositoryResult<Vec<BalanceRow>> {
        let rows = group_balances::Entity::find()
            .filter(group_balances::Column::GroupId.eq(group_id.into_inner()))
            .all(conn)
            .await?;
        let mut rows = rows.into_iter().map(to_row).collect::<RepositoryResult<Vec<_>>>()?;
        rows.sort_by_key(|r| r.user_id);
        Ok(rows)
    }

    /// Lists a user's rows across groups, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_by_user<C: ConnectionTrait>(
        conn: &C,
        user_id: UserId,
    ) -> RepositoryResult<Vec<BalanceRow>> {
        group_balances::Entity::find()
            .filter(group_balances::Column::UserId.eq(user_id.into_inner()))
            .order_by_desc(group_balances::Column::LastUpdated)
            .all(conn)
            .await?
            .into_iter()
            .map(to_row)
            .collect()
    }

    /// Deletes every row of a group. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_all_by_group<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
    ) -> RepositoryResult<u64> {
        let result = group_balances::Entity::delete_many()
            .filter(group_balances::Column::GroupId.eq(group_id.into_inner()))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Loads a group's rows as a snapshot of totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn snapshot<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
    ) -> RepositoryResult<LedgerSnapshot> {
        let mut snapshot = LedgerSnapshot::new();
        for row in Self::list_by_group(conn, group_id).await? {
            snapshot.insert(row.user_id, row.totals());
        }
        Ok(snapshot)
    }
}

fn to_row(model: group_balances::Model) -> RepositoryResult<BalanceRow> {
    let currency = CurrencyCode::parse(&model.currency)
        .map_err(|e| RepositoryError::corrupt("group_balances", model.id, e.to_string()))?;
    Ok(BalanceRow {
        id: BalanceId::from_uuid(model.id),
        group_id: GroupId::from_uuid(model.group_id),
        user_id: UserId::from_uuid(model.user_id),
        user_name: model.user_name,
        currency,
        total_paid: read_money(model.total_paid),
        total_owed: read_money(model.total_owed),
        balance: read_money(model.balance),
        last_transaction_id: model.last_transaction_id.map(TransactionId::from_uuid),
        last_updated: from_db_time(model.last_updated),
        version: model.version,
    })
}
