//! Debt simplification.
//!
//! Turns a group's net balances into a short list of pairwise transfers that
//! bring every member back to zero.

pub mod simplifier;

#[cfg(test)]
mod props;

pub use simplifier::{DebtSimplifier, SuggestedTransfer};
