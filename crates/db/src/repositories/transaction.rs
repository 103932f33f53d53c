//! Transaction repository for expense and settlement persistence.
//!
//! A transaction is stored as a header row plus one `transaction_entries`
//! row per paid or owed line, in input order.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, Set,
};
use splitledger_core::ledger::{
    Entry, EntrySide, SettlementDetails, SplitType, Transaction, TransactionStatus,
    TransactionType,
};
use splitledger_shared::types::{
    CurrencyCode, EntryId, GroupId, PageRequest, PageResponse, TransactionId, UserId,
};
use uuid::Uuid;

use super::{from_db_time, read_money, to_db_time};
use crate::entities::{transaction_entries, transactions};
use crate::error::{RepositoryError, RepositoryResult};

/// Filter options for listing transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    /// Only this type.
    pub transaction_type: Option<TransactionType>,
    /// Only transactions dated at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

/// Transaction data access.
pub struct TransactionRepository;

impl TransactionRepository {
    /// Inserts a transaction header and its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub async fn insert<C: ConnectionTrait>(conn: &C, txn: &Transaction) -> RepositoryResult<()> {
        let settlement = txn.settlement.as_ref();
        transactions::ActiveModel {
            id: Set(txn.id.into_inner()),
            group_id: Set(txn.group_id.into_inner()),
            transaction_type: Set(txn.transaction_type.as_str().to_string()),
            description: Set(txn.description.clone()),
            amount: Set(txn.amount),
            currency: Set(txn.currency.as_str().to_string()),
            transaction_date: Set(to_db_time(txn.date)),
            split_type: Set(txn.split_type.map(|s| s.as_str().to_string())),
            category: Set(txn.category.clone()),
            notes: Set(txn.notes.clone()),
            status: Set(txn.status.as_str().to_string()),
            settled_at: Set(settlement.map(|s| to_db_time(s.settled_at))),
            settlement_method: Set(settlement.and_then(|s| s.method.clone())),
            proof_of_payment: Set(settlement.and_then(|s| s.proof.clone())),
            created_by: Set(txn.created_by.into_inner()),
            created_at: Set(to_db_time(txn.created_at)),
            updated_at: Set(to_db_time(txn.updated_at)),
            updated_by: Set(txn.updated_by.map(UserId::into_inner)),
        }
        .insert(conn)
        .await?;

        for (position, entry) in (0i32..).zip(&txn.entries) {
            transaction_entries::ActiveModel {
                id: Set(EntryId::new().into_inner()),
                transaction_id: Set(txn.id.into_inner()),
                group_id: Set(txn.group_id.into_inner()),
                user_id: Set(entry.user_id.into_inner()),
                user_name: Set(entry.user_name.clone()),
                side: Set(entry.side.as_str().to_string()),
                amount: Set(entry.amount),
                position: Set(position),
            }
            .insert(conn)
            .await?;
        }

        Ok(())
    }

    /// Writes the mutable header fields back, provided the stored status is
    /// still `expected`. Returns false if no row matched.
    ///
    /// Lines and amounts are never rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_header<C: ConnectionTrait>(
        conn: &C,
        txn: &Transaction,
        expected: TransactionStatus,
    ) -> RepositoryResult<bool> {
        let settlement = txn.settlement.as_ref();
        let result = transactions::Entity::update_many()
            .col_expr(transactions::Column::Description, Expr::value(txn.description.clone()))
            .col_expr(transactions::Column::Category, Expr::value(txn.category.clone()))
            .col_expr(transactions::Column::Notes, Expr::value(txn.notes.clone()))
            .col_expr(transactions::Column::Status, Expr::value(txn.status.as_str()))
            .col_expr(
                transactions::Column::SettledAt,
                Expr::value(settlement.map(|s| to_db_time(s.settled_at))),
            )
            .col_expr(
                transactions::Column::SettlementMethod,
                Expr::value(settlement.and_then(|s| s.method.clone())),
            )
            .col_expr(
                transactions::Column::ProofOfPayment,
                Expr::value(settlement.and_then(|s| s.proof.clone())),
            )
            .col_expr(transactions::Column::UpdatedAt, Expr::value(to_db_time(txn.updated_at)))
            .col_expr(
                transactions::Column::UpdatedBy,
                Expr::value(txn.updated_by.map(UserId::into_inner)),
            )
            .filter(transactions::Column::Id.eq(txn.id.into_inner()))
            .filter(transactions::Column::Status.eq(expected.as_str()))
            .exec(conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Deletes a transaction and its lines, provided the stored status is
    /// still `expected`. Returns false if no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete<C: ConnectionTrait>(
        conn: &C,
        id: TransactionId,
        expected: TransactionStatus,
    ) -> RepositoryResult<bool> {
        let result = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(id.into_inner()))
            .filter(transactions::Column::Status.eq(expected.as_str()))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }
        transaction_entries::Entity::delete_many()
            .filter(transaction_entries::Column::TransactionId.eq(id.into_inner()))
            .exec(conn)
            .await?;
        Ok(true)
    }

    /// Loads a transaction with its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        id: TransactionId,
    ) -> RepositoryResult<Option<Transaction>> {
        let Some(header) = transactions::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await?
        else {
            return Ok(None);
        };
        let mut txns = Self::hydrate(conn, vec![header]).await?;
        Ok(txns.pop())
    }

    /// Lists a group's transactions oldest first, ties broken by creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_by_group<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
        filter: TransactionFilter,
    ) -> RepositoryResult<Vec<Transaction>> {
        let headers = apply_filter(
            transactions::Entity::find()
                .filter(transactions::Column::GroupId.eq(group_id.into_inner())),
            filter,
        )
        .order_by_asc(transactions::Column::TransactionDate)
        .order_by_asc(transactions::Column::CreatedAt)
        .all(conn)
        .await?;
        Self::hydrate(conn, headers).await
    }

    /// Pages through a group's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn page_by_group<C: ConnectionTrait>(
        conn: &C,
        group_id: GroupId,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<PageResponse<Transaction>> {
        let query = apply_filter(
            transactions::Entity::find()
                .filter(transactions::Column::GroupId.eq(group_id.into_inner())),
            filter,
        );
        let total = query.clone().count(conn).await?;
        let headers = query
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(conn)
            .await?;
        let data = Self::hydrate(conn, headers).await?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Pages through every transaction a user has a line in, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn page_by_user<C: ConnectionTrait>(
        conn: &C,
        user_id: UserId,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<PageResponse<Transaction>> {
        let query = apply_filter(user_transactions(user_id), filter);
        let total = query.clone().count(conn).await?;
        let headers = query
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(conn)
            .await?;
        let data = Self::hydrate(conn, headers).await?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Lists every transaction a user has a line in, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_by_user<C: ConnectionTrait>(
        conn: &C,
        user_id: UserId,
    ) -> RepositoryResult<Vec<Transaction>> {
        let headers = user_transactions(user_id)
            .order_by_asc(transactions::Column::TransactionDate)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(conn)
            .await?;
        Self::hydrate(conn, headers).await
    }

    /// Attaches lines to headers, preserving header order.
    async fn hydrate<C: ConnectionTrait>(
        conn: &C,
        headers: Vec<transactions::Model>,
    ) -> RepositoryResult<Vec<Transaction>> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let lines = transaction_entries::Entity::find()
            .filter(transaction_entries::Column::TransactionId.is_in(ids))
            .order_by_asc(transaction_entries::Column::TransactionId)
            .order_by_asc(transaction_entries::Column::Position)
            .all(conn)
            .await?;

        let mut by_txn: HashMap<Uuid, Vec<transaction_entries::Model>> = HashMap::new();
        for line in lines {
            by_txn.entry(line.transaction_id).or_default().push(line);
        }

        headers
            .into_iter()
            .map(|header| {
                let lines = by_txn.remove(&header.id).unwrap_or_default();
                to_domain(header, lines)
            })
            .collect()
    }
}

/// Headers of every transaction holding a line for `user_id`.
fn user_transactions(user_id: UserId) -> sea_orm::Select<transactions::Entity> {
    let lines = transaction_entries::Entity::find()
        .select_only()
        .column(transaction_entries::Column::TransactionId)
        .filter(transaction_entries::Column::UserId.eq(user_id.into_inner()))
        .into_query();
    transactions::Entity::find().filter(transactions::Column::Id.in_subquery(lines))
}

fn apply_filter(
    mut query: sea_orm::Select<transactions::Entity>,
    filter: TransactionFilter,
) -> sea_orm::Select<transactions::Entity> {
    if let Some(ty) = filter.transaction_type {
        query = query.filter(transactions::Column::TransactionType.eq(ty.as_str()));
    }
    if let Some(since) = filter.since {
        query = query.filter(transactions::Column::TransactionDate.gte(to_db_time(since)));
    }
    query
}

fn parse<T: FromStr<Err = String>>(raw: &str, id: Uuid, table: &'static str) -> RepositoryResult<T> {
    raw.parse().map_err(|e: String| RepositoryError::corrupt(table, id, e))
}

fn to_domain(
    header: transactions::Model,
    lines: Vec<transaction_entries::Model>,
) -> RepositoryResult<Transaction> {
    const TABLE: &str = "transactions";
    let id = header.id;

    let entries = lines
        .into_iter()
        .map(|line| {
            Ok(Entry {
                user_id: UserId::from_uuid(line.user_id),
                user_name: line.user_name,
                side: parse::<EntrySide>(&line.side, line.id, "transaction_entries")?,
                amount: read_money(line.amount),
            })
        })
        .collect::<RepositoryResult<Vec<_>>>()?;

    let settlement = header.settled_at.map(|settled_at| SettlementDetails {
        settled_at: from_db_time(settled_at),
        method: header.settlement_method.clone(),
        proof: header.proof_of_payment.clone(),
    });

    Ok(Transaction {
        id: TransactionId::from_uuid(id),
        group_id: GroupId::from_uuid(header.group_id),
        transaction_type: parse::<TransactionType>(&header.transaction_type, id, TABLE)?,
        description: header.description,
        amount: read_money(header.amount),
        currency: CurrencyCode::parse(&header.currency)
            .map_err(|e| RepositoryError::corrupt(TABLE, id, e.to_string()))?,
        date: from_db_time(header.transaction_date),
        split_type: header
            .split_type
            .as_deref()
            .map(|s| parse::<SplitType>(s, id, TABLE))
            .transpose()?,
        category: header.category,
        notes: header.notes,
        status: parse::<TransactionStatus>(&header.status, id, TABLE)?,
        settlement,
        created_by: UserId::from_uuid(header.created_by),
        created_at: from_db_time(header.created_at),
        updated_at: from_db_time(header.updated_at),
        updated_by: header.updated_by.map(UserId::from_uuid),
        entries,
    })
}
