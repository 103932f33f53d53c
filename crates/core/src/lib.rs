//! Core business logic for Splitledger.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `money` - Decimal-safe amounts, tolerance and split allocation
//! - `ledger` - Transactions, balance deltas, replay and state machine guards
//! - `settlement` - Debt simplification
//! - `analytics` - Group and user activity summaries
//! - `ports` - Group and user directory interfaces
//! - `notification` - Participant notifications

pub mod analytics;
pub mod ledger;
pub mod money;
pub mod notification;
pub mod ports;
pub mod settlement;
