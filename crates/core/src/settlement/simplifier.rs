//! Greedy max-pair debt simplifier.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_shared::types::UserId;

use crate::money::{TOLERANCE, round_money};

/// A transfer that moves a debtor toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuggestedTransfer {
    /// Member who should pay.
    pub from_user: UserId,
    /// Member who should receive.
    pub to_user: UserId,
    /// Amount to transfer.
    pub amount: Decimal,
}

/// Greedy max-pair debt simplifier.
pub struct DebtSimplifier;

impl DebtSimplifier {
    /// Computes suggested transfers for a set of net balances.
    ///
    /// Each step pairs the largest debtor with the largest creditor and
    /// transfers the smaller of the two magnitudes, zeroing at least one of
    /// them. Ties go to the lowest user id. Stops once every balance is
    /// within 0.01 of zero, so at most `n - 1` transfers are produced.
    ///
    /// Balances are expected to sum to zero; any residue is left on the
    /// working set.
    #[must_use]
    pub fn simplify(balances: impl IntoIterator<Item = (UserId, Decimal)>) -> Vec<SuggestedTransfer> {
        let mut working: BTreeMap<UserId, Decimal> = BTreeMap::new();
        for (user_id, balance) in balances {
            *working.entry(user_id).or_default() += balance;
        }

        let mut transfers = Vec::new();
        let max_steps = working.len();

        for _ in 0..max_steps {
            let mut creditor: Option<(UserId, Decimal)> = None;
            let mut debtor: Option<(UserId, Decimal)> = None;
            for (&user_id, &balance) in &working {
                if creditor.is_none_or(|(_, max)| balance > max) {
                    creditor = Some((user_id, balance));
                }
                if debtor.is_none_or(|(_, min)| balance < min) {
                    debtor = Some((user_id, balance));
                }
            }

            let (Some((to_user, credit)), Some((from_user, debt))) = (creditor, debtor) else {
                break;
            };
            if credit <= TOLERANCE && debt >= -TOLERANCE {
                break;
            }

            let amount = round_money(credit.min(-debt));
            if amount <= Decimal::ZERO {
                break;
            }

            transfers.push(SuggestedTransfer {
                from_user,
                to_user,
                amount,
            });
            *working.entry(from_user).or_default() += amount;
            *working.entry(to_user).or_default() -= amount;
        }

        transfers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn test_three_way_dinner() {
        let (a, b, c) = (user(1), user(2), user(3));
        let transfers = DebtSimplifier::simplify([(a, dec!(60)), (b, dec!(-30)), (c, dec!(-30))]);

        assert_eq!(
            transfers,
            vec![
                SuggestedTransfer {
                    from_user: b,
                    to_user: a,
                    amount: dec!(30),
                },
                SuggestedTransfer {
                    from_user: c,
                    to_user: a,
                    amount: dec!(30),
                },
            ]
        );
    }

    #[test]
    fn test_after_partial_settlement() {
        let (a, b, c) = (user(1), user(2), user(3));
        let transfers = DebtSimplifier::simplify([(a, dec!(30)), (b, dec!(0)), (c, dec!(-30))]);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].from_user, c);
        assert_eq!(transfers[0].to_user, a);
        assert_eq!(transfers[0].amount, dec!(30));
    }

    #[test]
    fn test_settled_group_needs_nothing() {
        let transfers = DebtSimplifier::simplify([
            (user(1), dec!(0.01)),
            (user(2), dec!(-0.01)),
            (user(3), Decimal::ZERO),
        ]);
        assert!(transfers.is_empty());
        assert!(DebtSimplifier::simplify(Vec::new()).is_empty());
    }

    #[test]
    fn test_largest_pair_first() {
        let (a, b, c, d) = (user(1), user(2), user(3), user(4));
        let transfers = DebtSimplifier::simplify([
            (a, dec!(100)),
            (b, dec!(20)),
            (c, dec!(-70)),
            (d, dec!(-50)),
        ]);

        assert_eq!(transfers[0].from_user, c);
        assert_eq!(transfers[0].to_user, a);
        assert_eq!(transfers[0].amount, dec!(70));
        assert_eq!(transfers.len(), 3);
    }

    #[test]
    fn test_cent_sized_debts_are_still_collected() {
        let creditor = user(1);
        let mut balances = vec![(creditor, dec!(0.03))];
        balances.extend((2..=4).map(|n| (user(n), dec!(-0.01))));

        let transfers = DebtSimplifier::simplify(balances);
        // The last cent is within tolerance and stays put.
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.to_user == creditor && t.amount == dec!(0.01)));
    }

    #[test]
    fn test_ties_break_on_lowest_id() {
        let (a, b, c, d) = (user(1), user(2), user(3), user(4));
        let transfers = DebtSimplifier::simplify([
            (d, dec!(-10)),
            (c, dec!(-10)),
            (b, dec!(10)),
            (a, dec!(10)),
        ]);

        assert_eq!(transfers[0].from_user, c);
        assert_eq!(transfers[0].to_user, a);
        assert_eq!(transfers[1].from_user, d);
        assert_eq!(transfers[1].to_user, b);
    }
}
