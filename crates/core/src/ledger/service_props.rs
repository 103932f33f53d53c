//! Property-based tests for LedgerService.
//!
//! - Every built expense nets to zero across its participants
//! - Deleting a transaction restores the balances it changed
//! - Folding transactions in any order gives the same balances
//! - A group's balances always cancel out, even when exact splits are a
//!   cent off

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use splitledger_shared::types::{CurrencyCode, GroupId, UserId};

use super::balance::LedgerSnapshot;
use super::service::LedgerService;
use super::transaction::Transaction;
use super::types::{CreateExpenseInput, CreateSettlementInput, PayerInput, ShareInput, SplitSpec};
use crate::ports::GroupInfo;

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate whole percentages summing to exactly 100.
fn percentages(count: usize) -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(1u32..100u32, count).prop_map(|weights| {
        let sum: u32 = weights.iter().sum();
        let mut out: Vec<Decimal> = weights
            .iter()
            .map(|w| Decimal::from(w * 100 / sum))
            .collect();
        let allotted: Decimal = out.iter().sum();
        out[0] += Decimal::ONE_HUNDRED - allotted;
        out
    })
}

fn group(size: usize) -> GroupInfo {
    let members: Vec<UserId> = (0..size).map(|_| UserId::new()).collect();
    GroupInfo {
        id: GroupId::new(),
        name: "Props".into(),
        currency: CurrencyCode::parse("EUR").unwrap(),
        created_by: members[0],
        members,
    }
}

fn name(user_id: UserId) -> String {
    user_id.to_string()
}

fn equal_expense(group: &GroupInfo, payer: usize, amount: Decimal) -> Transaction {
    let input = CreateExpenseInput {
        group_id: group.id,
        created_by: group.members[payer],
        description: "Shared".into(),
        amount,
        currency: None,
        date: None,
        payers: vec![PayerInput {
            user_id: group.members[payer],
            amount,
        }],
        split: SplitSpec::Equal(group.members.clone()),
        category: None,
        notes: None,
        completed: false,
    };
    LedgerService::build_expense(&input, group, name, Utc::now()).unwrap()
}

/// Two-way exact split whose shares miss the total by `skew` cents.
fn skewed_exact_expense(
    group: &GroupInfo,
    payer: usize,
    amount: Decimal,
    skew: i64,
) -> Transaction {
    let other = (payer + 1) % group.members.len();
    let first = (amount / Decimal::TWO).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let second = (amount - first + Decimal::new(skew, 2)).max(Decimal::ZERO);
    let input = CreateExpenseInput {
        group_id: group.id,
        created_by: group.members[payer],
        description: "Exact".into(),
        amount,
        currency: None,
        date: None,
        payers: vec![PayerInput {
            user_id: group.members[payer],
            amount,
        }],
        split: SplitSpec::Exact(vec![
            ShareInput {
                user_id: group.members[payer],
                value: first,
            },
            ShareInput {
                user_id: group.members[other],
                value: second,
            },
        ]),
        category: None,
        notes: None,
        completed: false,
    };
    LedgerService::build_expense(&input, group, name, Utc::now()).unwrap()
}

fn settlement(group: &GroupInfo, from: usize, to: usize, amount: Decimal) -> Transaction {
    let input = CreateSettlementInput {
        group_id: group.id,
        created_by: group.members[from],
        payer_id: group.members[from],
        payee_id: group.members[to],
        amount,
        currency: None,
        date: None,
        notes: None,
        completed: false,
    };
    LedgerService::build_settlement(&input, group, name, Utc::now()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_equal_expense_is_conserved(
        amount in positive_amount(),
        size in 1usize..8,
    ) {
        let group = group(size);
        let txn = equal_expense(&group, 0, amount);

        prop_assert!(txn.is_conserved());
        prop_assert_eq!(txn.owed_total(), amount);
        prop_assert_eq!(txn.paid_total(), amount);
    }

    #[test]
    fn prop_percentage_expense_is_conserved(
        amount in positive_amount(),
        pcts in (2usize..6).prop_flat_map(percentages),
    ) {
        let group = group(pcts.len());
        let shares: Vec<ShareInput> = group
            .members
            .iter()
            .zip(&pcts)
            .map(|(user_id, value)| ShareInput { user_id: *user_id, value: *value })
            .collect();
        let input = CreateExpenseInput {
            group_id: group.id,
            created_by: group.members[0],
            description: "Split by percent".into(),
            amount,
            currency: None,
            date: None,
            payers: vec![PayerInput { user_id: group.members[1], amount }],
            split: SplitSpec::Percentage(shares),
            category: None,
            notes: None,
            completed: false,
        };

        let txn = LedgerService::build_expense(&input, &group, name, Utc::now()).unwrap();
        prop_assert!(txn.is_conserved());
        prop_assert_eq!(txn.owed_total(), amount);
    }

    #[test]
    fn prop_delete_restores_balances(
        amounts in prop::collection::vec(positive_amount(), 1..6),
        removed in any::<prop::sample::Index>(),
    ) {
        let group = group(4);
        let txns: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| equal_expense(&group, i % 4, *amount))
            .collect();

        let victim = removed.index(txns.len());
        let mut live = LedgerSnapshot::replay(&txns);
        live.revert_transaction(&txns[victim]);

        let survivors: Vec<&Transaction> = txns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != victim)
            .map(|(_, t)| t)
            .collect();
        let expected = LedgerSnapshot::replay(survivors);

        prop_assert!(live.drift_against(&expected).is_empty());
    }

    #[test]
    fn prop_replay_is_order_independent(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        settle in positive_amount(),
    ) {
        let group = group(3);
        let mut txns: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| equal_expense(&group, i % 3, *amount))
            .collect();
        txns.push(settlement(&group, 1, 0, settle));

        let forward = LedgerSnapshot::replay(&txns);
        let backward = LedgerSnapshot::replay(txns.iter().rev());

        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_group_balances_cancel_out(
        amounts in prop::collection::vec(positive_amount(), 1..10),
        skewed in prop::collection::vec((positive_amount(), -1i64..=1), 0..10),
        settle in positive_amount(),
    ) {
        let group = group(5);
        let mut txns: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| equal_expense(&group, i % 5, *amount))
            .collect();
        txns.extend(
            skewed
                .iter()
                .enumerate()
                .map(|(i, (amount, skew))| skewed_exact_expense(&group, i % 5, *amount, *skew)),
        );
        txns.push(settlement(&group, 2, 3, settle));

        for txn in &txns {
            prop_assert_eq!(txn.paid_total(), txn.owed_total());
        }
        let snapshot = LedgerSnapshot::replay(&txns);
        prop_assert!(snapshot.is_conserved());
        prop_assert_eq!(snapshot.total_balance(), Decimal::ZERO);
    }
}
