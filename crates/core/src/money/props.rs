//! Property-based tests for money primitives.
//!
//! - Equal-split total preservation
//! - Percentage-split total preservation
//! - Share fairness (no two equal shares differ by more than a cent)

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::allocation::AllocationUtil;
use super::{TOLERANCE, approx_eq, has_money_precision, round_money};

/// Strategy to generate positive cent amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a recipient count (1 to 50).
fn recipient_count() -> impl Strategy<Value = usize> {
    1usize..50
}

/// Strategy to generate percentages that sum to 100.
fn percentages_summing_to_100() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(1u32..100, 1..10).prop_map(|values| {
        let sum: u32 = values.iter().sum();
        values
            .iter()
            .map(|v| Decimal::ONE_HUNDRED * Decimal::from(*v) / Decimal::from(sum))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Equal shares always sum to the total exactly.
    #[test]
    fn prop_equal_split_preserves_total(
        total in positive_amount(),
        count in recipient_count(),
    ) {
        let shares = AllocationUtil::allocate_equal(total, count);
        prop_assert_eq!(shares.len(), count);
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
    }

    /// Equal shares differ from one another by at most one cent.
    #[test]
    fn prop_equal_split_is_fair(
        total in positive_amount(),
        count in recipient_count(),
    ) {
        let shares = AllocationUtil::allocate_equal(total, count);
        let max = shares.iter().copied().max().unwrap_or_default();
        let min = shares.iter().copied().min().unwrap_or_default();
        prop_assert!(max - min <= TOLERANCE);
    }

    /// Leftover cents go to the front of the recipient list.
    #[test]
    fn prop_equal_split_is_non_increasing(
        total in positive_amount(),
        count in recipient_count(),
    ) {
        let shares = AllocationUtil::allocate_equal(total, count);
        for pair in shares.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }

    /// Every equal share is expressed in whole cents.
    #[test]
    fn prop_equal_split_cent_precision(
        total in positive_amount(),
        count in recipient_count(),
    ) {
        for share in AllocationUtil::allocate_equal(total, count) {
            prop_assert!(has_money_precision(share));
        }
    }

    /// Percentage shares always sum to the total exactly.
    #[test]
    fn prop_percentage_split_preserves_total(
        total in positive_amount(),
        percentages in percentages_summing_to_100(),
    ) {
        let shares = AllocationUtil::allocate_by_percentages(total, &percentages);
        prop_assert_eq!(shares.len(), percentages.len());
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
    }

    /// Each percentage share stays within a cent of its exact value.
    #[test]
    fn prop_percentage_split_close_to_exact(
        total in positive_amount(),
        percentages in percentages_summing_to_100(),
    ) {
        let shares = AllocationUtil::allocate_by_percentages(total, &percentages);
        for (share, pct) in shares.iter().zip(percentages.iter()) {
            let exact = total * *pct / Decimal::ONE_HUNDRED;
            prop_assert!(approx_eq(*share, exact), "share {} vs exact {}", share, exact);
        }
    }

    /// Rounding is idempotent.
    #[test]
    fn prop_round_money_idempotent(
        raw in (-1_000_000_000i64..1_000_000_000i64).prop_map(|v| Decimal::new(v, 4)),
    ) {
        let once = round_money(raw);
        prop_assert_eq!(round_money(once), once);
        prop_assert!(has_money_precision(once));
    }
}
