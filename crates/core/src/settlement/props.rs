//! Property-based tests for the debt simplifier.

use proptest::prelude::*;
use rust_decimal::Decimal;
use splitledger_shared::types::UserId;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::DebtSimplifier;
use crate::money::is_negligible;

/// Strategy to generate balances for 1..10 members that sum to zero.
fn zero_sum_balances() -> impl Strategy<Value = Vec<(UserId, Decimal)>> {
    prop::collection::vec(-500_000i64..500_000i64, 1..10).prop_map(|mut cents| {
        let sum: i64 = cents.iter().sum();
        let last = cents.len() - 1;
        cents[last] -= sum;
        cents
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let id = u128::try_from(i).unwrap() + 1;
                (UserId::from_uuid(Uuid::from_u128(id)), Decimal::new(c, 2))
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_settles_everyone(balances in zero_sum_balances()) {
        let transfers = DebtSimplifier::simplify(balances.clone());

        let mut working: BTreeMap<UserId, Decimal> = balances.into_iter().collect();
        for t in &transfers {
            *working.get_mut(&t.from_user).unwrap() += t.amount;
            *working.get_mut(&t.to_user).unwrap() -= t.amount;
        }
        for balance in working.values() {
            prop_assert!(is_negligible(*balance), "left {} unsettled", balance);
        }
    }

    #[test]
    fn prop_at_most_n_minus_one_transfers(balances in zero_sum_balances()) {
        let n = balances.len();
        let transfers = DebtSimplifier::simplify(balances);
        prop_assert!(transfers.len() <= n.saturating_sub(1));
    }

    #[test]
    fn prop_transfers_are_positive_and_flow_downhill(balances in zero_sum_balances()) {
        let start: BTreeMap<UserId, Decimal> = balances.iter().copied().collect();
        for t in DebtSimplifier::simplify(balances) {
            prop_assert!(t.amount > Decimal::ZERO);
            prop_assert_ne!(t.from_user, t.to_user);
            prop_assert!(start[&t.from_user] < Decimal::ZERO);
            prop_assert!(start[&t.to_user] > Decimal::ZERO);
        }
    }

    #[test]
    fn prop_deterministic(balances in zero_sum_balances()) {
        let mut shuffled = balances.clone();
        shuffled.reverse();
        prop_assert_eq!(
            DebtSimplifier::simplify(balances),
            DebtSimplifier::simplify(shuffled)
        );
    }
}
