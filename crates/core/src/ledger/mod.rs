//! Expense ledger logic.
//!
//! This module implements the core ledger functionality:
//! - Transaction aggregates with paid and owed lines
//! - Running balance arithmetic and drift detection
//! - Split resolution and state machine guards
//! - Domain types for transaction creation
//! - Error types for ledger operations

pub mod balance;
pub mod error;
pub mod service;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod service_props;

pub use balance::{BalanceDelta, BalanceDrift, BalanceTotals, LedgerSnapshot};
pub use error::{LedgerError, LedgerResult, parse_id};
pub use service::LedgerService;
pub use transaction::{Entry, Participant, SettlementDetails, Transaction};
pub use types::{
    CompleteSettlementInput, CreateExpenseInput, CreateSettlementInput, EntrySide,
    ParticipantRole, PayerInput, SettlementRequest, ShareInput, SplitSpec, SplitType,
    TransactionStatus, TransactionType, UpdateTransactionInput,
};
