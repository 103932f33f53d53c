//! Participant notifications.
//!
//! The engine builds one [`Notification`] per member involved in a new
//! transaction and hands each to a [`NotificationDispatcher`] after commit.
//! Delivery is best-effort: failures are logged by the caller and never
//! reach the writer.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_shared::types::{CurrencyCode, GroupId, TransactionId, UserId};
use thiserror::Error;

use crate::ledger::{Transaction, TransactionType};

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The recipient has no delivery channel.
    #[error("No delivery channel for user {0}")]
    NoChannel(UserId),
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An expense was recorded.
    ExpenseAdded,
    /// A settlement was recorded.
    SettlementAdded,
}

/// Structured payload attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    /// What happened.
    pub kind: NotificationKind,
    /// The new transaction.
    pub transaction_id: TransactionId,
    /// Its group.
    pub group_id: GroupId,
    /// Transaction total.
    pub amount: Decimal,
    /// Transaction currency.
    pub currency: CurrencyCode,
}

/// A message for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Recipient.
    pub user_id: UserId,
    /// Short headline.
    pub title: String,
    /// Human readable body.
    pub body: String,
    /// Structured payload.
    pub data: NotificationData,
}

/// Delivers notifications.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if delivery failed.
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Dispatcher that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            user_id = %notification.user_id,
            transaction_id = %notification.data.transaction_id,
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

/// Builds notifications for every member involved in `txn`.
///
/// The creator is skipped unless `notify_creator` is set. Recipients appear
/// once each, in line order.
#[must_use]
pub fn notifications_for(
    txn: &Transaction,
    group_name: &str,
    notify_creator: bool,
) -> Vec<Notification> {
    let (kind, title, body) = match txn.transaction_type {
        TransactionType::Settlement => (
            NotificationKind::SettlementAdded,
            "New Settlement",
            format!("A settlement was recorded in {group_name}"),
        ),
        _ => (
            NotificationKind::ExpenseAdded,
            "New Expense Added",
            format!(
                "A new expense '{}' was added to {group_name}",
                txn.description
            ),
        ),
    };

    txn.participants()
        .into_iter()
        .filter(|p| notify_creator || p.user_id != txn.created_by)
        .map(|p| Notification {
            user_id: p.user_id,
            title: title.to_string(),
            body: body.clone(),
            data: NotificationData {
                kind,
                transaction_id: txn.id,
                group_id: txn.group_id,
                amount: txn.amount,
                currency: txn.currency.clone(),
            },
        })
        .collect()
}
