//! Decimal-safe money primitives.
//!
//! All amounts are `rust_decimal::Decimal` with two meaningful decimal places.
//! Comparisons that involve sums of user-supplied values go through
//! [`approx_eq`] so that a one-cent rounding residue never fails a check.

pub mod allocation;

#[cfg(test)]
mod props;

pub use allocation::AllocationUtil;

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places money is rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Largest difference at which two amounts are considered equal (0.01).
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, MONEY_SCALE);

/// Smallest positive amount a transaction or share may carry (0.01).
pub const MIN_AMOUNT: Decimal = TOLERANCE;

/// Rounds an amount to cents, halves away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns true if `a` and `b` differ by at most [`TOLERANCE`].
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= TOLERANCE
}

/// Returns true if the amount is within [`TOLERANCE`] of zero.
#[must_use]
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() <= TOLERANCE
}

/// Returns true if the amount carries no more than cent precision.
#[must_use]
pub fn has_money_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}
