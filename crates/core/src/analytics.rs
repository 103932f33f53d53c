//! Group and user analytics.
//!
//! Pure aggregations over transactions and ledger balances the caller has
//! already loaded.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use splitledger_shared::types::{CurrencyCode, GroupId, TransactionId, UserId};

use crate::ledger::{Participant, Transaction, TransactionType};
use crate::money::TOLERANCE;

/// Sign of a balance, ignoring sub-cent residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSign {
    /// Owed money.
    Positive,
    /// Owes money.
    Negative,
    /// Settled.
    Zero,
}

impl BalanceSign {
    /// Classifies a balance with a 0.01 dead band.
    #[must_use]
    pub fn of(balance: Decimal) -> Self {
        if balance > TOLERANCE {
            Self::Positive
        } else if balance < -TOLERANCE {
            Self::Negative
        } else {
            Self::Zero
        }
    }
}

/// Member count per balance sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Members the group owes.
    pub positive: u32,
    /// Members who owe the group.
    pub negative: u32,
    /// Settled members.
    pub zero: u32,
}

impl BalanceSummary {
    fn record(&mut self, balance: Decimal) {
        match BalanceSign::of(balance) {
            BalanceSign::Positive => self.positive += 1,
            BalanceSign::Negative => self.negative += 1,
            BalanceSign::Zero => self.zero += 1,
        }
    }
}

/// Activity summary of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAnalytics {
    /// Group id.
    pub group_id: GroupId,
    /// Group name.
    pub group_name: String,
    /// Group currency.
    pub currency: CurrencyCode,
    /// Number of members.
    pub member_count: usize,
    /// Every recorded transaction.
    pub total_transactions: usize,
    /// Number of expenses.
    pub total_expenses: usize,
    /// Number of settlements.
    pub total_settlements: usize,
    /// Sum of expense amounts.
    pub total_expense_amount: Decimal,
    /// Sum of settlement amounts.
    pub total_settlement_amount: Decimal,
    /// Members per balance sign.
    pub balances_summary: BalanceSummary,
}

impl GroupAnalytics {
    /// Aggregates a group's transactions and net balances.
    #[must_use]
    pub fn compute(
        group_id: GroupId,
        group_name: &str,
        currency: &CurrencyCode,
        member_count: usize,
        transactions: &[Transaction],
        balances: impl IntoIterator<Item = Decimal>,
    ) -> Self {
        let mut analytics = Self {
            group_id,
            group_name: group_name.to_string(),
            currency: currency.clone(),
            member_count,
            total_transactions: transactions.len(),
            total_expenses: 0,
            total_settlements: 0,
            total_expense_amount: Decimal::ZERO,
            total_settlement_amount: Decimal::ZERO,
            balances_summary: BalanceSummary::default(),
        };

        for txn in transactions {
            match txn.transaction_type {
                TransactionType::Expense => {
                    analytics.total_expenses += 1;
                    analytics.total_expense_amount += txn.amount;
                }
                TransactionType::Settlement => {
                    analytics.total_settlements += 1;
                    analytics.total_settlement_amount += txn.amount;
                }
                TransactionType::Refund | TransactionType::Adjustment => {}
            }
        }
        for balance in balances {
            analytics.balances_summary.record(balance);
        }
        analytics
    }
}

/// Group count per sign of the user's balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupsSummary {
    /// Groups where the user owes money.
    pub owe_money: u32,
    /// Groups where the user is owed money.
    pub owed_money: u32,
    /// Groups where the user is settled.
    pub balanced: u32,
}

/// Activity summary of one user across groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAnalytics {
    /// User id.
    pub user_id: UserId,
    /// Groups with a ledger row for the user.
    pub total_groups: usize,
    /// Transactions the user took part in.
    pub total_transactions: usize,
    /// Expenses among them.
    pub total_expenses: usize,
    /// Settlements among them.
    pub total_settlements: usize,
    /// Sum of the user's balances across groups.
    pub net_balance: Decimal,
    /// Groups per balance sign.
    pub groups_summary: GroupsSummary,
}

impl UserAnalytics {
    /// Aggregates a user's per-group balances and transactions.
    #[must_use]
    pub fn compute(user_id: UserId, balances: &[Decimal], transactions: &[Transaction]) -> Self {
        let mut summary = GroupsSummary::default();
        for balance in balances {
            match BalanceSign::of(*balance) {
                BalanceSign::Positive => summary.owed_money += 1,
                BalanceSign::Negative => summary.owe_money += 1,
                BalanceSign::Zero => summary.balanced += 1,
            }
        }

        let count = |ty: TransactionType| {
            transactions
                .iter()
                .filter(|t| t.transaction_type == ty)
                .count()
        };

        Self {
            user_id,
            total_groups: balances.len(),
            total_transactions: transactions.len(),
            total_expenses: count(TransactionType::Expense),
            total_settlements: count(TransactionType::Settlement),
            net_balance: balances.iter().sum(),
            groups_summary: summary,
        }
    }
}

/// One transaction in a balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    /// Transaction id.
    pub transaction_id: TransactionId,
    /// Expense or settlement.
    pub transaction_type: TransactionType,
    /// Description.
    pub description: String,
    /// Total amount.
    pub amount: Decimal,
    /// Net positions of the members involved.
    pub participants: Vec<Participant>,
}

/// Transactions of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    /// UTC calendar date.
    pub date: NaiveDate,
    /// Transactions in date order.
    pub transactions: Vec<HistoryItem>,
}

/// Groups transactions by UTC calendar date, oldest day first.
///
/// Within a day, transactions keep their timestamp order.
#[must_use]
pub fn balance_history(transactions: &[Transaction]) -> Vec<DailyActivity> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    let mut days: BTreeMap<NaiveDate, Vec<HistoryItem>> = BTreeMap::new();
    for txn in sorted {
        days.entry(txn.date.date_naive())
            .or_default()
            .push(HistoryItem {
                transaction_id: txn.id,
                transaction_type: txn.transaction_type,
                description: txn.description.clone(),
                amount: txn.amount,
                participants: txn.participants(),
            });
    }

    days.into_iter()
        .map(|(date, transactions)| DailyActivity { date, transactions })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Entry, SplitType, TransactionStatus};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn txn(ty: TransactionType, amount: Decimal, day: u32, hour: u32) -> Transaction {
        let a = UserId::new();
        let b = UserId::new();
        let date = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
        Transaction {
            id: TransactionId::new(),
            group_id: GroupId::new(),
            transaction_type: ty,
            description: format!("{ty} {day}/{hour}"),
            amount,
            currency: CurrencyCode::parse("USD").unwrap(),
            date,
            split_type: (ty == TransactionType::Expense).then_some(SplitType::Equal),
            category: None,
            notes: None,
            status: TransactionStatus::initial(ty, false),
            settlement: None,
            created_by: a,
            created_at: date,
            updated_at: date,
            updated_by: None,
            entries: vec![Entry::paid(a, "A", amount), Entry::owed(b, "B", amount)],
        }
    }

    #[rstest]
    #[case(dec!(0.02), BalanceSign::Positive)]
    #[case(dec!(0.01), BalanceSign::Zero)]
    #[case(dec!(-0.01), BalanceSign::Zero)]
    #[case(dec!(-0.02), BalanceSign::Negative)]
    fn test_balance_sign(#[case] balance: Decimal, #[case] expected: BalanceSign) {
        assert_eq!(BalanceSign::of(balance), expected);
    }

    #[test]
    fn test_group_analytics() {
        let transactions = vec![
            txn(TransactionType::Expense, dec!(90), 1, 9),
            txn(TransactionType::Expense, dec!(10.50), 2, 9),
            txn(TransactionType::Settlement, dec!(30), 3, 9),
        ];
        let analytics = GroupAnalytics::compute(
            GroupId::new(),
            "Flat",
            &CurrencyCode::parse("USD").unwrap(),
            3,
            &transactions,
            [dec!(30), Decimal::ZERO, dec!(-30)],
        );

        assert_eq!(analytics.total_transactions, 3);
        assert_eq!(analytics.total_expenses, 2);
        assert_eq!(analytics.total_settlements, 1);
        assert_eq!(analytics.total_expense_amount, dec!(100.50));
        assert_eq!(analytics.total_settlement_amount, dec!(30));
        assert_eq!(
            analytics.balances_summary,
            BalanceSummary {
                positive: 1,
                negative: 1,
                zero: 1,
            }
        );
    }

    #[test]
    fn test_group_analytics_json_shape() {
        let analytics = GroupAnalytics::compute(
            GroupId::new(),
            "Flat",
            &CurrencyCode::parse("EUR").unwrap(),
            2,
            &[],
            [dec!(5), dec!(-5)],
        );
        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["balances_summary"]["positive"], 1);
        assert_eq!(json["total_expense_amount"], "0");
    }

    #[test]
    fn test_user_analytics() {
        let user = UserId::new();
        let transactions = vec![
            txn(TransactionType::Expense, dec!(40), 1, 9),
            txn(TransactionType::Settlement, dec!(5), 2, 9),
        ];
        let analytics =
            UserAnalytics::compute(user, &[dec!(12.50), dec!(-20), Decimal::ZERO], &transactions);

        assert_eq!(analytics.total_groups, 3);
        assert_eq!(analytics.net_balance, dec!(-7.50));
        assert_eq!(analytics.total_expenses, 1);
        assert_eq!(analytics.total_settlements, 1);
        assert_eq!(
            analytics.groups_summary,
            GroupsSummary {
                owe_money: 1,
                owed_money: 1,
                balanced: 1,
            }
        );
    }

    #[test]
    fn test_history_groups_by_day() {
        let late = txn(TransactionType::Expense, dec!(5), 4, 18);
        let early = txn(TransactionType::Expense, dec!(6), 4, 8);
        let before = txn(TransactionType::Settlement, dec!(7), 2, 12);

        let history = balance_history(&[late.clone(), before.clone(), early.clone()]);

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(history[0].transactions[0].transaction_id, before.id);
        assert_eq!(history[1].transactions.len(), 2);
        assert_eq!(history[1].transactions[0].transaction_id, early.id);
        assert_eq!(history[1].transactions[1].transaction_id, late.id);
        assert_eq!(history[1].transactions[1].participants.len(), 2);
    }
}
