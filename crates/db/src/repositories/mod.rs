//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Write paths that must join an engine transaction are associated functions
//! generic over [`sea_orm::ConnectionTrait`].

pub mod balance;
pub mod group;
pub mod transaction;
pub mod user;

pub use balance::{BalanceRepository, BalanceRow, BalanceWrite};
pub use group::{GroupRecord, GroupRepository};
pub use transaction::{TransactionFilter, TransactionRepository};
pub use user::UserRepository;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Scale money columns are stored with.
const STORED_SCALE: u32 = 4;

/// Normalizes a money column read back from storage.
///
/// `SQLite` round-trips decimals through floating point, so values are
/// rounded back to the column scale.
pub(crate) fn read_money(value: Decimal) -> Decimal {
    value.round_dp(STORED_SCALE).normalize()
}

pub(crate) fn to_db_time(value: DateTime<Utc>) -> DateTimeWithTimeZone {
    value.fixed_offset()
}

pub(crate) fn from_db_time(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_read_money_strips_float_noise() {
        assert_eq!(read_money(dec!(33.330000000001)), dec!(33.33));
        assert_eq!(read_money(dec!(60.0000)).to_string(), "60");
    }

    #[test]
    fn test_time_round_trip() {
        let now = Utc::now();
        assert_eq!(from_db_time(to_db_time(now)), now);
    }
}
