//! Ledger service for transaction validation and state transitions.
//!
//! This module provides the pure business rules applied before anything is
//! persisted: split resolution, conservation checks, and the guards of the
//! transaction state machine. Lookups the rules need (group membership,
//! display names) are passed in by the caller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use splitledger_shared::types::{TransactionId, UserId};

use super::error::{LedgerError, LedgerResult};
use super::transaction::{Entry, SettlementDetails, Transaction};
use super::types::{
    CompleteSettlementInput, CreateExpenseInput, CreateSettlementInput, PayerInput, SplitSpec,
    TransactionStatus, TransactionType, UpdateTransactionInput,
};
use crate::money::{AllocationUtil, MIN_AMOUNT, approx_eq, has_money_precision};
use crate::ports::GroupInfo;

/// Longest accepted transaction description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Longest accepted group name, in characters.
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Description given to settlements.
pub const SETTLEMENT_DESCRIPTION: &str = "Settlement";

/// Ledger service for transaction validation and state transitions.
///
/// This service contains pure business logic with no database dependencies.
pub struct LedgerService;

impl LedgerService {
    /// Validates and builds a new expense.
    ///
    /// Steps:
    /// 1. Creator must belong to the group
    /// 2. Description and amount must be well formed
    /// 3. Payers must be distinct members whose amounts sum to the total
    /// 4. The split is resolved to per-member amounts summing to the total
    /// 5. Paid and owed lines must cancel out
    ///
    /// # Arguments
    ///
    /// * `input` - The expense as supplied by the caller
    /// * `group` - The group snapshot
    /// * `user_name` - Display name lookup for line denormalization
    /// * `now` - Creation timestamp
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` describing the first rule that failed.
    pub fn build_expense<N>(
        input: &CreateExpenseInput,
        group: &GroupInfo,
        user_name: N,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction>
    where
        N: Fn(UserId) -> String,
    {
        Self::ensure_member(group, input.created_by)?;
        let description = Self::validate_description(&input.description)?;
        Self::validate_amount(input.amount)?;
        Self::validate_payers(input.amount, &input.payers)?;
        let shares = Self::resolve_split(input.amount, &input.split)?;

        for user_id in input
            .payers
            .iter()
            .map(|p| p.user_id)
            .chain(shares.iter().map(|(id, _)| *id))
        {
            if !group.is_member(user_id) {
                return Err(LedgerError::ParticipantNotMember(user_id));
            }
        }

        let mut paid: Vec<(UserId, Decimal)> =
            input.payers.iter().map(|p| (p.user_id, p.amount)).collect();
        absorb_residue(input.amount, &mut paid);

        let mut entries: Vec<Entry> = paid
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(user_id, amount)| Entry::paid(*user_id, user_name(*user_id), *amount))
            .collect();
        entries.extend(
            shares
                .iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(user_id, amount)| Entry::owed(*user_id, user_name(*user_id), *amount)),
        );

        let txn = Transaction {
            id: TransactionId::new(),
            group_id: group.id,
            transaction_type: TransactionType::Expense,
            description,
            amount: input.amount,
            currency: input.currency.clone().unwrap_or_else(|| group.currency.clone()),
            date: input.date.unwrap_or(now),
            split_type: Some(input.split.split_type()),
            category: normalize_optional(input.category.as_deref()),
            notes: normalize_optional(input.notes.as_deref()),
            status: TransactionStatus::initial(TransactionType::Expense, input.completed),
            settlement: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            updated_by: None,
            entries,
        };

        Self::ensure_conserved(&txn)?;
        Ok(txn)
    }

    /// Validates and builds a new settlement.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the creator, payer or payee is not a member,
    /// payer and payee coincide, or the amount is invalid.
    pub fn build_settlement<N>(
        input: &CreateSettlementInput,
        group: &GroupInfo,
        user_name: N,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction>
    where
        N: Fn(UserId) -> String,
    {
        Self::ensure_member(group, input.created_by)?;
        if input.payer_id == input.payee_id {
            return Err(LedgerError::SelfSettlement);
        }
        for user_id in [input.payer_id, input.payee_id] {
            if !group.is_member(user_id) {
                return Err(LedgerError::ParticipantNotMember(user_id));
            }
        }
        Self::validate_amount(input.amount)?;

        let completed = input.completed;
        let txn = Transaction {
            id: TransactionId::new(),
            group_id: group.id,
            transaction_type: TransactionType::Settlement,
            description: SETTLEMENT_DESCRIPTION.to_string(),
            amount: input.amount,
            currency: input.currency.clone().unwrap_or_else(|| group.currency.clone()),
            date: input.date.unwrap_or(now),
            split_type: None,
            category: None,
            notes: normalize_optional(input.notes.as_deref()),
            status: TransactionStatus::initial(TransactionType::Settlement, completed),
            settlement: completed.then_some(SettlementDetails {
                settled_at: now,
                method: None,
                proof: None,
            }),
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            updated_by: None,
            entries: vec![
                Entry::paid(input.payer_id, user_name(input.payer_id), input.amount),
                Entry::owed(input.payee_id, user_name(input.payee_id), input.amount),
            ],
        };

        Self::ensure_conserved(&txn)?;
        Ok(txn)
    }

    /// Checks that `user_id` belongs to the group.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` otherwise.
    pub fn ensure_member(group: &GroupInfo, user_id: UserId) -> LedgerResult<()> {
        if group.is_member(user_id) {
            Ok(())
        } else {
            Err(LedgerError::NotGroupMember {
                group_id: group.id,
                user_id,
            })
        }
    }

    /// Trims and length-checks a description.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescription` when empty or longer than 200 characters.
    pub fn validate_description(raw: &str) -> LedgerResult<String> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::InvalidDescription {
                max: MAX_DESCRIPTION_LEN,
            });
        }
        Ok(trimmed.to_string())
    }

    /// Trims and length-checks a group name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupName` when empty or longer than 100 characters.
    pub fn validate_group_name(raw: &str) -> LedgerResult<String> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > MAX_GROUP_NAME_LEN {
            return Err(LedgerError::InvalidGroupName {
                max: MAX_GROUP_NAME_LEN,
            });
        }
        Ok(trimmed.to_string())
    }

    /// Checks that an amount is at least 0.01 and has cent precision.
    ///
    /// # Errors
    ///
    /// Returns `AmountTooSmall` or `ExcessPrecision`.
    pub fn validate_amount(amount: Decimal) -> LedgerResult<()> {
        if amount < MIN_AMOUNT {
            return Err(LedgerError::AmountTooSmall(amount));
        }
        if !has_money_precision(amount) {
            return Err(LedgerError::ExcessPrecision(amount));
        }
        Ok(())
    }

    /// Validates the payer list against the total.
    ///
    /// A cent of difference is tolerated here; `build_expense` moves it onto
    /// the largest payer line so the stored lines sum to the total exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, repeats a user, holds an invalid
    /// amount, or does not sum to `total` within 0.01.
    pub fn validate_payers(total: Decimal, payers: &[PayerInput]) -> LedgerResult<()> {
        if payers.is_empty() {
            return Err(LedgerError::NoPayers);
        }
        ensure_distinct(payers.iter().map(|p| p.user_id))?;
        for payer in payers {
            Self::validate_amount(payer.amount)?;
        }

        let paid: Decimal = payers.iter().map(|p| p.amount).sum();
        if !approx_eq(paid, total) {
            return Err(LedgerError::PayersMismatch {
                expected: total,
                actual: paid,
            });
        }
        Ok(())
    }

    /// Resolves a split specification into per-member amounts.
    ///
    /// - Equal: leftover cents go to the first recipients in input order
    /// - Exact: shares must sum to the total within 0.01; the difference is
    ///   moved onto the largest share
    /// - Percentage: percentages must sum to 100 within 0.01; amounts are
    ///   allocated so they sum to the total exactly
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first violated rule.
    pub fn resolve_split(total: Decimal, spec: &SplitSpec) -> LedgerResult<Vec<(UserId, Decimal)>> {
        if spec.is_empty() {
            return Err(LedgerError::NoSplits);
        }
        ensure_distinct(spec.user_ids().into_iter())?;

        let mut shares = match spec {
            SplitSpec::Equal(users) => users
                .iter()
                .copied()
                .zip(AllocationUtil::allocate_equal(total, users.len()))
                .collect::<Vec<_>>(),
            SplitSpec::Exact(shares) => {
                for share in shares {
                    if share.value.is_sign_negative() && !share.value.is_zero() {
                        return Err(LedgerError::NegativeShare(share.user_id));
                    }
                    if !has_money_precision(share.value) {
                        return Err(LedgerError::ExcessPrecision(share.value));
                    }
                }
                shares.iter().map(|s| (s.user_id, s.value)).collect()
            }
            SplitSpec::Percentage(shares) => {
                for share in shares {
                    if share.value.is_sign_negative() && !share.value.is_zero() {
                        return Err(LedgerError::NegativeShare(share.user_id));
                    }
                    if share.value > Decimal::ONE_HUNDRED {
                        return Err(LedgerError::PercentageOutOfRange(share.user_id));
                    }
                }
                let percent_total: Decimal = shares.iter().map(|s| s.value).sum();
                if !approx_eq(percent_total, Decimal::ONE_HUNDRED) {
                    return Err(LedgerError::PercentagesMismatch(percent_total));
                }
                let percentages: Vec<Decimal> = shares.iter().map(|s| s.value).collect();
                shares
                    .iter()
                    .map(|s| s.user_id)
                    .zip(AllocationUtil::allocate_by_percentages(total, &percentages))
                    .collect()
            }
        };

        let owed: Decimal = shares.iter().map(|(_, amount)| *amount).sum();
        if !approx_eq(owed, total) {
            return Err(LedgerError::SplitsMismatch {
                expected: total,
                actual: owed,
            });
        }
        absorb_residue(total, &mut shares);
        Ok(shares)
    }

    fn ensure_conserved(txn: &Transaction) -> LedgerResult<()> {
        if txn.is_conserved() {
            Ok(())
        } else {
            Err(LedgerError::Unbalanced {
                paid: txn.paid_total(),
                owed: txn.owed_total(),
            })
        }
    }

    /// Guards an edit and applies it in place.
    ///
    /// Only the creator may edit, only expenses are editable, completed
    /// transactions are immutable, and structural fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns the first failed guard.
    pub fn apply_update(
        txn: &mut Transaction,
        user_id: UserId,
        input: &UpdateTransactionInput,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if txn.transaction_type != TransactionType::Expense {
            return Err(LedgerError::NotEditable);
        }
        if txn.created_by != user_id {
            return Err(LedgerError::NotCreator {
                action: "edit this transaction",
            });
        }
        if txn.status.is_completed() {
            return Err(LedgerError::CompletedImmutable {
                id: txn.id,
                action: "edited",
            });
        }
        let amount_changed = input.amount.is_some_and(|amount| amount != txn.amount);
        if input.payers.is_some() || input.split.is_some() || amount_changed {
            return Err(LedgerError::StructuralUpdate);
        }
        if input.description.is_none() && input.category.is_none() && input.notes.is_none() {
            return Err(LedgerError::EmptyUpdate);
        }

        if let Some(description) = &input.description {
            txn.description = Self::validate_description(description)?;
        }
        if let Some(category) = &input.category {
            txn.category = normalize_optional(Some(category));
        }
        if let Some(notes) = &input.notes {
            txn.notes = normalize_optional(Some(notes));
        }
        txn.updated_at = now;
        txn.updated_by = Some(user_id);
        Ok(())
    }

    /// Guards a deletion.
    ///
    /// # Errors
    ///
    /// Returns `NotCreator` for anyone but the creator and
    /// `CompletedImmutable` for completed settlements.
    pub fn validate_can_delete(txn: &Transaction, user_id: UserId) -> LedgerResult<()> {
        if txn.created_by != user_id {
            return Err(LedgerError::NotCreator {
                action: "delete this transaction",
            });
        }
        if txn.is_settlement() && txn.status.is_completed() {
            return Err(LedgerError::CompletedImmutable {
                id: txn.id,
                action: "deleted",
            });
        }
        Ok(())
    }

    /// Guards a settlement completion and applies it in place.
    ///
    /// Completion annotates the transaction only; balances are untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotASettlement`, `NotSettlementParty` or `AlreadyCompleted`.
    pub fn complete_settlement(
        txn: &mut Transaction,
        user_id: UserId,
        input: &CompleteSettlementInput,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if !txn.is_settlement() {
            return Err(LedgerError::NotASettlement(txn.id));
        }
        if !txn.involves(user_id) {
            return Err(LedgerError::NotSettlementParty(txn.id));
        }
        if txn.status.is_completed() {
            return Err(LedgerError::AlreadyCompleted(txn.id));
        }

        txn.status = TransactionStatus::Completed;
        txn.settlement = Some(SettlementDetails {
            settled_at: now,
            method: normalize_optional(input.method.as_deref()),
            proof: normalize_optional(input.proof.as_deref()),
        });
        if let Some(notes) = normalize_optional(input.notes.as_deref()) {
            txn.notes = Some(notes);
        }
        txn.updated_at = now;
        txn.updated_by = Some(user_id);
        Ok(())
    }

    /// Checks a bulk settlement request size.
    ///
    /// # Errors
    ///
    /// Returns `EmptyBatch` or `BatchTooLarge`.
    pub fn validate_batch(len: usize, max: usize) -> LedgerResult<()> {
        if len == 0 {
            return Err(LedgerError::EmptyBatch);
        }
        if len > max {
            return Err(LedgerError::BatchTooLarge { max, actual: len });
        }
        Ok(())
    }
}

fn ensure_distinct(users: impl Iterator<Item = UserId>) -> LedgerResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for user_id in users {
        if !seen.insert(user_id) {
            return Err(LedgerError::DuplicateParticipant(user_id));
        }
    }
    Ok(())
}

/// Moves the difference between `total` and the line sum onto the first
/// largest line, leaving the lines summing to `total` exactly.
fn absorb_residue(total: Decimal, lines: &mut [(UserId, Decimal)]) {
    let residue = total - lines.iter().map(|(_, amount)| *amount).sum::<Decimal>();
    if residue.is_zero() {
        return;
    }
    let largest = lines
        .iter_mut()
        .reduce(|best, line| if line.1 > best.1 { line } else { best });
    if let Some((_, amount)) = largest {
        *amount += residue;
    }
}

fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{ParticipantRole, ShareInput, SplitType};
    use rust_decimal_macros::dec;
    use splitledger_shared::types::{CurrencyCode, GroupId};

    struct Fixture {
        group: GroupInfo,
        a: UserId,
        b: UserId,
        c: UserId,
    }

    fn fixture() -> Fixture {
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();
        Fixture {
            group: GroupInfo {
                id: GroupId::new(),
                name: "Flat".into(),
                currency: CurrencyCode::parse("USD").unwrap(),
                created_by: a,
                members: vec![a, b, c],
            },
            a,
            b,
            c,
        }
    }

    fn name(user_id: UserId) -> String {
        format!("user-{user_id}")
    }

    fn expense(f: &Fixture, amount: Decimal, split: SplitSpec) -> CreateExpenseInput {
        CreateExpenseInput {
            group_id: f.group.id,
            created_by: f.a,
            description: "Dinner".into(),
            amount,
            currency: None,
            date: None,
            payers: vec![PayerInput {
                user_id: f.a,
                amount,
            }],
            split,
            category: None,
            notes: None,
            completed: false,
        }
    }

    fn settlement(f: &Fixture, amount: Decimal) -> CreateSettlementInput {
        CreateSettlementInput {
            group_id: f.group.id,
            created_by: f.b,
            payer_id: f.b,
            payee_id: f.a,
            amount,
            currency: None,
            date: None,
            notes: None,
            completed: false,
        }
    }

    // =========================================================================
    // Expense construction
    // =========================================================================

    #[test]
    fn test_equal_expense_nets_out() {
        let f = fixture();
        let input = expense(&f, dec!(90.00), SplitSpec::Equal(vec![f.a, f.b, f.c]));
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();

        assert_eq!(txn.status, TransactionStatus::Open);
        assert_eq!(txn.split_type, Some(SplitType::Equal));
        assert_eq!(txn.currency.as_str(), "USD");

        let participants = txn.participants();
        assert_eq!(participants[0].net_amount, dec!(60));
        assert_eq!(participants[0].role, ParticipantRole::Both);
        assert_eq!(participants[1].net_amount, dec!(-30));
        assert_eq!(participants[2].net_amount, dec!(-30));
    }

    #[test]
    fn test_split_short_by_one_cent_of_two_is_rejected() {
        let f = fixture();
        let input = expense(
            &f,
            dec!(100.00),
            SplitSpec::Exact(vec![
                ShareInput {
                    user_id: f.a,
                    value: dec!(50.00),
                },
                ShareInput {
                    user_id: f.b,
                    value: dec!(49.98),
                },
            ]),
        );
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::SplitsMismatch { .. }));
    }

    #[test]
    fn test_split_within_tolerance_is_accepted() {
        let f = fixture();
        let input = expense(
            &f,
            dec!(100.00),
            SplitSpec::Exact(vec![
                ShareInput {
                    user_id: f.b,
                    value: dec!(50.00),
                },
                ShareInput {
                    user_id: f.c,
                    value: dec!(49.99),
                },
            ]),
        );
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        let owed: Vec<Decimal> = txn.splits().map(|e| e.amount).collect();
        assert_eq!(owed, vec![dec!(50.01), dec!(49.99)]);
        assert_eq!(txn.owed_total(), dec!(100.00));
        assert_eq!(txn.paid_total(), txn.owed_total());
    }

    #[test]
    fn test_split_over_by_one_cent_lands_on_largest_share() {
        let f = fixture();
        let input = expense(
            &f,
            dec!(30.00),
            SplitSpec::Exact(vec![
                ShareInput {
                    user_id: f.a,
                    value: dec!(10.00),
                },
                ShareInput {
                    user_id: f.b,
                    value: dec!(10.01),
                },
                ShareInput {
                    user_id: f.c,
                    value: dec!(10.00),
                },
            ]),
        );
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        let owed: Vec<Decimal> = txn.splits().map(|e| e.amount).collect();
        assert_eq!(owed, vec![dec!(10.00), dec!(10.00), dec!(10.00)]);
        assert!(txn.is_conserved());
    }

    #[test]
    fn test_payers_within_tolerance_store_the_exact_total() {
        let f = fixture();
        let mut input = expense(&f, dec!(60.00), SplitSpec::Equal(vec![f.a, f.b, f.c]));
        input.payers = vec![
            PayerInput {
                user_id: f.a,
                amount: dec!(29.99),
            },
            PayerInput {
                user_id: f.b,
                amount: dec!(30.00),
            },
        ];
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        let paid: Vec<Decimal> = txn.payers().map(|e| e.amount).collect();
        assert_eq!(paid, vec![dec!(29.99), dec!(30.01)]);
        assert_eq!(txn.paid_total(), dec!(60.00));
        assert_eq!(txn.owed_total(), dec!(60.00));
    }

    #[test]
    fn test_percentage_split() {
        let f = fixture();
        let input = expense(
            &f,
            dec!(200),
            SplitSpec::Percentage(vec![
                ShareInput {
                    user_id: f.a,
                    value: dec!(50),
                },
                ShareInput {
                    user_id: f.b,
                    value: dec!(25),
                },
                ShareInput {
                    user_id: f.c,
                    value: dec!(25),
                },
            ]),
        );
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        let owed: Vec<Decimal> = txn.splits().map(|e| e.amount).collect();
        assert_eq!(owed, vec![dec!(100), dec!(50), dec!(50)]);
    }

    #[test]
    fn test_percentages_must_sum_to_hundred() {
        let f = fixture();
        let input = expense(
            &f,
            dec!(200),
            SplitSpec::Percentage(vec![
                ShareInput {
                    user_id: f.a,
                    value: dec!(50),
                },
                ShareInput {
                    user_id: f.b,
                    value: dec!(40),
                },
            ]),
        );
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::PercentagesMismatch(_)));
    }

    #[test]
    fn test_payers_must_sum_to_total() {
        let f = fixture();
        let mut input = expense(&f, dec!(50), SplitSpec::Equal(vec![f.a, f.b]));
        input.payers = vec![PayerInput {
            user_id: f.a,
            amount: dec!(40),
        }];
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::PayersMismatch { .. }));
    }

    #[test]
    fn test_expense_requires_payers_and_splits() {
        let f = fixture();
        let mut input = expense(&f, dec!(50), SplitSpec::Equal(vec![]));
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::NoSplits));

        input.payers.clear();
        input.split = SplitSpec::Equal(vec![f.b]);
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::NoPayers));
    }

    #[test]
    fn test_non_member_creator_is_unauthorized() {
        let f = fixture();
        let mut input = expense(&f, dec!(50), SplitSpec::Equal(vec![f.a, f.b]));
        input.created_by = UserId::new();
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::NotGroupMember { .. }));
    }

    #[test]
    fn test_non_member_split_is_rejected() {
        let f = fixture();
        let outsider = UserId::new();
        let input = expense(&f, dec!(50), SplitSpec::Equal(vec![f.a, outsider]));
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::ParticipantNotMember(id) if id == outsider));
    }

    #[test]
    fn test_duplicate_split_user_is_rejected() {
        let f = fixture();
        let input = expense(&f, dec!(50), SplitSpec::Equal(vec![f.b, f.b]));
        let err = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateParticipant(_)));
    }

    #[test]
    fn test_amount_rules() {
        assert!(matches!(
            LedgerService::validate_amount(Decimal::ZERO),
            Err(LedgerError::AmountTooSmall(_))
        ));
        assert!(matches!(
            LedgerService::validate_amount(dec!(-5)),
            Err(LedgerError::AmountTooSmall(_))
        ));
        assert!(matches!(
            LedgerService::validate_amount(dec!(1.005)),
            Err(LedgerError::ExcessPrecision(_))
        ));
        assert!(LedgerService::validate_amount(dec!(0.01)).is_ok());
    }

    #[test]
    fn test_description_rules() {
        assert_eq!(
            LedgerService::validate_description("  Groceries ").unwrap(),
            "Groceries"
        );
        assert!(LedgerService::validate_description("   ").is_err());
        assert!(LedgerService::validate_description(&"x".repeat(201)).is_err());
        assert!(LedgerService::validate_description(&"x".repeat(200)).is_ok());
    }

    #[test]
    fn test_group_name_rules() {
        assert!(LedgerService::validate_group_name("Trip").is_ok());
        assert!(LedgerService::validate_group_name("").is_err());
        assert!(LedgerService::validate_group_name(&"g".repeat(101)).is_err());
    }

    #[test]
    fn test_completed_expense_starts_completed() {
        let f = fixture();
        let mut input = expense(&f, dec!(10), SplitSpec::Equal(vec![f.b]));
        input.completed = true;
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
    }

    // =========================================================================
    // Settlement construction
    // =========================================================================

    #[test]
    fn test_settlement_lines() {
        let f = fixture();
        let txn =
            LedgerService::build_settlement(&settlement(&f, dec!(30)), &f.group, name, Utc::now())
                .unwrap();
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.description, SETTLEMENT_DESCRIPTION);
        let participants = txn.participants();
        assert_eq!(participants[0].user_id, f.b);
        assert_eq!(participants[0].net_amount, dec!(30));
        assert_eq!(participants[1].user_id, f.a);
        assert_eq!(participants[1].role, ParticipantRole::Payee);
        assert!(txn.settlement.is_none());
    }

    #[test]
    fn test_settlement_recorded_completed() {
        let f = fixture();
        let mut input = settlement(&f, dec!(30));
        input.completed = true;
        let txn = LedgerService::build_settlement(&input, &f.group, name, Utc::now()).unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!(txn.settlement.is_some());
    }

    #[test]
    fn test_self_settlement_rejected() {
        let f = fixture();
        let mut input = settlement(&f, dec!(30));
        input.payee_id = f.b;
        let err = LedgerService::build_settlement(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::SelfSettlement));
    }

    #[test]
    fn test_settlement_with_outsider_rejected() {
        let f = fixture();
        let mut input = settlement(&f, dec!(30));
        input.payee_id = UserId::new();
        let err = LedgerService::build_settlement(&input, &f.group, name, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::ParticipantNotMember(_)));
    }

    // =========================================================================
    // State machine guards
    // =========================================================================

    #[test]
    fn test_complete_settlement_flow() {
        let f = fixture();
        let mut txn =
            LedgerService::build_settlement(&settlement(&f, dec!(30)), &f.group, name, Utc::now())
                .unwrap();

        let outsider = UserId::new();
        let err = LedgerService::complete_settlement(
            &mut txn,
            outsider,
            &CompleteSettlementInput::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotSettlementParty(_)));

        let input = CompleteSettlementInput {
            notes: Some("paid in cash".into()),
            method: Some("cash".into()),
            proof: None,
        };
        LedgerService::complete_settlement(&mut txn, f.a, &input, Utc::now()).unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert_eq!(txn.notes.as_deref(), Some("paid in cash"));
        assert_eq!(
            txn.settlement.as_ref().and_then(|s| s.method.as_deref()),
            Some("cash")
        );

        let err = LedgerService::complete_settlement(&mut txn, f.b, &input, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCompleted(_)));
    }

    #[test]
    fn test_complete_expense_is_invalid_state() {
        let f = fixture();
        let mut txn = LedgerService::build_expense(
            &expense(&f, dec!(10), SplitSpec::Equal(vec![f.b])),
            &f.group,
            name,
            Utc::now(),
        )
        .unwrap();
        let err = LedgerService::complete_settlement(
            &mut txn,
            f.a,
            &CompleteSettlementInput::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotASettlement(_)));
    }

    #[test]
    fn test_delete_guards() {
        let f = fixture();
        let mut txn =
            LedgerService::build_settlement(&settlement(&f, dec!(30)), &f.group, name, Utc::now())
                .unwrap();

        assert!(matches!(
            LedgerService::validate_can_delete(&txn, f.a),
            Err(LedgerError::NotCreator { .. })
        ));
        assert!(LedgerService::validate_can_delete(&txn, f.b).is_ok());

        txn.status = TransactionStatus::Completed;
        assert!(matches!(
            LedgerService::validate_can_delete(&txn, f.b),
            Err(LedgerError::CompletedImmutable { .. })
        ));
    }

    #[test]
    fn test_completed_expense_can_be_deleted() {
        let f = fixture();
        let mut input = expense(&f, dec!(10), SplitSpec::Equal(vec![f.b]));
        input.completed = true;
        let txn = LedgerService::build_expense(&input, &f.group, name, Utc::now()).unwrap();
        assert!(LedgerService::validate_can_delete(&txn, f.a).is_ok());
    }

    #[test]
    fn test_update_guards() {
        let f = fixture();
        let mut txn = LedgerService::build_expense(
            &expense(&f, dec!(10), SplitSpec::Equal(vec![f.b])),
            &f.group,
            name,
            Utc::now(),
        )
        .unwrap();

        let err = LedgerService::apply_update(
            &mut txn,
            f.a,
            &UpdateTransactionInput::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::EmptyUpdate));

        let structural = UpdateTransactionInput {
            amount: Some(dec!(12)),
            ..Default::default()
        };
        let err = LedgerService::apply_update(&mut txn, f.a, &structural, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::StructuralUpdate));

        let edit = UpdateTransactionInput {
            description: Some("Lunch".into()),
            amount: Some(dec!(10)),
            ..Default::default()
        };
        let err = LedgerService::apply_update(&mut txn, f.b, &edit, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::NotCreator { .. }));

        LedgerService::apply_update(&mut txn, f.a, &edit, Utc::now()).unwrap();
        assert_eq!(txn.description, "Lunch");
        assert_eq!(txn.updated_by, Some(f.a));
    }

    #[test]
    fn test_settlement_is_not_editable() {
        let f = fixture();
        let mut txn =
            LedgerService::build_settlement(&settlement(&f, dec!(30)), &f.group, name, Utc::now())
                .unwrap();
        let edit = UpdateTransactionInput {
            notes: Some("x".into()),
            ..Default::default()
        };
        let err = LedgerService::apply_update(&mut txn, f.b, &edit, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::NotEditable));
    }

    #[test]
    fn test_batch_limits() {
        assert!(matches!(
            LedgerService::validate_batch(0, 50),
            Err(LedgerError::EmptyBatch)
        ));
        assert!(matches!(
            LedgerService::validate_batch(51, 50),
            Err(LedgerError::BatchTooLarge { max: 50, actual: 51 })
        ));
        assert!(LedgerService::validate_batch(50, 50).is_ok());
    }
}
