//! Share allocation using the Largest Remainder Method.
//!
//! Splitting a bill must never lose or invent a cent: the shares returned by
//! both functions here always sum to the (cent-rounded) total.
//!
//! The method works by:
//! 1. Calculate exact shares
//! 2. Truncate each share to cents
//! 3. Calculate the leftover (total - sum of truncated)
//! 4. Hand leftover cents out one at a time, in a fixed priority order

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::{MONEY_SCALE, round_money};

/// Allocation utility for splitting an expense total into shares.
pub struct AllocationUtil;

impl AllocationUtil {
    /// Splits `total` equally across `count` recipients.
    ///
    /// Each share is the total divided by the count, truncated to cents. The
    /// leftover cents go one each to the first recipients in input order, so
    /// the sum of the shares equals the total exactly.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use splitledger_core::money::AllocationUtil;
    ///
    /// // 100 / 3 = [33.34, 33.33, 33.33], sum = 100.00
    /// let result = AllocationUtil::allocate_equal(dec!(100), 3);
    /// assert_eq!(result.iter().sum::<rust_decimal::Decimal>(), dec!(100));
    /// ```
    #[must_use]
    pub fn allocate_equal(total: Decimal, count: usize) -> Vec<Decimal> {
        if count == 0 {
            return vec![];
        }

        let total_rounded = round_money(total);
        if count == 1 {
            return vec![total_rounded];
        }

        let count_dec = Decimal::from(count);
        let unit = Decimal::new(1, MONEY_SCALE);

        let base = (total_rounded / count_dec)
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
        let remainder = total_rounded - base * count_dec;

        let extra_count = (remainder / unit)
            .round_dp_with_strategy(0, RoundingStrategy::ToZero)
            .to_usize()
            .unwrap_or(0);

        (0..count)
            .map(|i| if i < extra_count { base + unit } else { base })
            .collect()
    }

    /// Splits `total` by percentages.
    ///
    /// Shares are truncated to cents, then the cents needed to reach the total
    /// are added to the shares with the largest truncated fraction (earlier
    /// input wins ties). When the percentages overshoot 100 slightly, cents are
    /// taken back from the shares with the smallest fraction instead. Either way
    /// the sum of the shares equals the total exactly.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use splitledger_core::money::AllocationUtil;
    ///
    /// let percentages = vec![dec!(50), dec!(30), dec!(20)];
    /// let result = AllocationUtil::allocate_by_percentages(dec!(100), &percentages);
    /// assert_eq!(result, vec![dec!(50), dec!(30), dec!(20)]);
    /// ```
    #[must_use]
    pub fn allocate_by_percentages(total: Decimal, percentages: &[Decimal]) -> Vec<Decimal> {
        if percentages.is_empty() {
            return vec![];
        }

        let unit = Decimal::new(1, MONEY_SCALE);
        let total_rounded = round_money(total);

        let exact: Vec<Decimal> = percentages
            .iter()
            .map(|p| total_rounded * *p / Decimal::ONE_HUNDRED)
            .collect();

        let mut shares: Vec<Decimal> = exact
            .iter()
            .map(|a| a.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero))
            .collect();

        let allocated: Decimal = shares.iter().copied().sum();
        let units = ((total_rounded - allocated) / unit)
            .round_dp_with_strategy(0, RoundingStrategy::ToZero)
            .to_i64()
            .unwrap_or(0);

        if units == 0 {
            return shares;
        }

        // Indices ordered by truncated fraction, largest first. The sort is
        // stable so equal fractions keep input order.
        let mut order: Vec<usize> = (0..shares.len()).collect();
        order.sort_by(|&a, &b| (exact[b] - shares[b]).cmp(&(exact[a] - shares[a])));

        if units > 0 {
            for step in 0..units.unsigned_abs() {
                let idx = order[Self::cycle(step, order.len())];
                shares[idx] += unit;
            }
        } else {
            order.reverse();
            let mut remaining = units.unsigned_abs();
            let mut step = 0u64;
            // Each full pass over `order` either takes a cent or proves no
            // share can give one up.
            let max_steps = remaining.saturating_mul(order.len() as u64 + 1);
            while remaining > 0 && step < max_steps {
                let idx = order[Self::cycle(step, order.len())];
                if shares[idx] >= unit {
                    shares[idx] -= unit;
                    remaining -= 1;
                }
                step += 1;
            }
        }

        shares
    }

    fn cycle(step: u64, len: usize) -> usize {
        usize::try_from(step % len as u64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    // =========================================================================
    // allocate_equal tests
    // =========================================================================

    #[test]
    fn test_allocate_equal_empty() {
        assert!(AllocationUtil::allocate_equal(dec!(100), 0).is_empty());
    }

    #[test]
    fn test_allocate_equal_single() {
        assert_eq!(AllocationUtil::allocate_equal(dec!(100), 1), vec![dec!(100)]);
    }

    #[test]
    fn test_allocate_equal_ninety_three_ways() {
        let result = AllocationUtil::allocate_equal(dec!(90.00), 3);
        assert_eq!(result, vec![dec!(30), dec!(30), dec!(30)]);
    }

    #[test]
    fn test_allocate_equal_thirds_extra_cent_goes_first() {
        let result = AllocationUtil::allocate_equal(dec!(100), 3);
        assert_eq!(result, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
    }

    #[test]
    fn test_allocate_equal_two_leftover_cents() {
        // 10.00 / 6 = 1.666.. -> base 1.66, leftover 0.04
        let result = AllocationUtil::allocate_equal(dec!(10.00), 6);
        assert_eq!(
            result,
            vec![dec!(1.67), dec!(1.67), dec!(1.67), dec!(1.67), dec!(1.66), dec!(1.66)]
        );
    }

    #[rstest]
    #[case(dec!(100), 3)]
    #[case(dec!(100), 7)]
    #[case(dec!(1000), 3)]
    #[case(dec!(1), 3)]
    #[case(dec!(0.01), 3)]
    #[case(dec!(999.99), 7)]
    fn test_allocate_equal_sum_invariant(#[case] total: Decimal, #[case] count: usize) {
        let result = AllocationUtil::allocate_equal(total, count);
        assert_eq!(result.len(), count);
        assert_eq!(result.iter().sum::<Decimal>(), total);
    }

    // =========================================================================
    // allocate_by_percentages tests
    // =========================================================================

    #[test]
    fn test_allocate_by_percentages_empty() {
        assert!(AllocationUtil::allocate_by_percentages(dec!(100), &[]).is_empty());
    }

    #[test]
    fn test_allocate_by_percentages_single() {
        let result = AllocationUtil::allocate_by_percentages(dec!(100), &[dec!(100)]);
        assert_eq!(result, vec![dec!(100)]);
    }

    #[test]
    fn test_allocate_by_percentages_thirds() {
        let percentages = vec![dec!(33.33), dec!(33.33), dec!(33.34)];
        let result = AllocationUtil::allocate_by_percentages(dec!(100), &percentages);
        assert_eq!(result, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    }

    #[test]
    fn test_allocate_by_percentages_leftover_to_largest_fraction() {
        // 10.00 at 1/3 each: 3.333.. truncated to 3.33 three times, one cent left
        let third = dec!(100) / dec!(3);
        let result = AllocationUtil::allocate_by_percentages(dec!(10.00), &[third, third, third]);
        assert_eq!(result.iter().sum::<Decimal>(), dec!(10.00));
        assert_eq!(result[0], dec!(3.34));
    }

    #[test]
    fn test_allocate_by_percentages_undershoot_still_sums_to_total() {
        // Percentages sum to 99.995, inside tolerance of 100
        let percentages = vec![dec!(49.995), dec!(50)];
        let result = AllocationUtil::allocate_by_percentages(dec!(1000.00), &percentages);
        assert_eq!(result.iter().sum::<Decimal>(), dec!(1000.00));
    }

    #[test]
    fn test_allocate_by_percentages_overshoot_still_sums_to_total() {
        // Percentages sum to 100.005, inside tolerance of 100
        let percentages = vec![dec!(50.005), dec!(50)];
        let result = AllocationUtil::allocate_by_percentages(dec!(1000.00), &percentages);
        assert_eq!(result.iter().sum::<Decimal>(), dec!(1000.00));
        assert!(result.iter().all(|share| *share >= Decimal::ZERO));
    }

    #[rstest]
    #[case(dec!(100), vec![dec!(33.33), dec!(33.33), dec!(33.34)])]
    #[case(dec!(1000), vec![dec!(25), dec!(25), dec!(25), dec!(25)])]
    #[case(dec!(99.99), vec![dec!(10), dec!(20), dec!(30), dec!(40)])]
    fn test_allocate_by_percentages_sum_invariant(
        #[case] total: Decimal,
        #[case] percentages: Vec<Decimal>,
    ) {
        let result = AllocationUtil::allocate_by_percentages(total, &percentages);
        assert_eq!(result.iter().sum::<Decimal>(), total);
    }
}
