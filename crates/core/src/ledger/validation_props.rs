//! Property-based tests for posting request validation.

use chrono::{Days, NaiveDate};
use ledgerline_shared::types::{AccountId, CurrencyCode, OfficeId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{PostingLine, PostingRequest};
use super::validation::BalanceValidator;

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    // Generate amounts from 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a zero or negative amount.
fn non_positive_amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(-cents, 2))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn line(account: i64, amount: Decimal) -> PostingLine {
    PostingLine {
        account_id: Some(AccountId(account)),
        amount: Some(amount),
        office_id: OfficeId(1),
        comments: None,
    }
}

/// Builds a request whose single credit balances the debits.
fn balanced_request(amounts: &[Decimal]) -> PostingRequest {
    let total: Decimal = amounts.iter().copied().sum();
    PostingRequest {
        currency_code: CurrencyCode::parse("USD").unwrap(),
        transaction_date: today(),
        comments: None,
        reference_number: None,
        accounting_rule_id: None,
        credits: vec![line(100, total)],
        debits: amounts
            .iter()
            .zip(1_i64..)
            .map(|(amount, account)| line(account, *amount))
            .collect(),
        entity: None,
        manual: true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Debits balanced by a single credit always pass.
    #[test]
    fn prop_balanced_request_accepted(
        amounts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let request = balanced_request(&amounts);
        prop_assert!(BalanceValidator::new(today(), &[]).validate(&request).is_ok());
    }

    /// Increasing any debit breaks the balance.
    #[test]
    fn prop_any_imbalance_rejected(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        bump in positive_amount(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut request = balanced_request(&amounts);
        let i = index.index(request.debits.len());
        request.debits[i].amount = request.debits[i].amount.map(|a| a + bump);
        let result = BalanceValidator::new(today(), &[]).validate(&request);
        prop_assert!(
            matches!(result, Err(LedgerError::SumMismatch { .. })),
            "Imbalance should be rejected, got: {:?}",
            result
        );
    }

    /// Zero or negative amounts are rejected before the sum check.
    #[test]
    fn prop_non_positive_amount_rejected(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        bad in non_positive_amount(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut request = balanced_request(&amounts);
        let i = index.index(request.debits.len());
        request.debits[i].amount = Some(bad);
        let result = BalanceValidator::new(today(), &[]).validate(&request);
        prop_assert!(
            matches!(result, Err(LedgerError::AccountOrAmountEmpty)),
            "Non-positive amount should be rejected, got: {:?}",
            result
        );
    }

    /// Any date after today is rejected.
    #[test]
    fn prop_future_date_rejected(
        amounts in prop::collection::vec(positive_amount(), 1..4),
        days_ahead in 1u64..3_650,
    ) {
        let mut request = balanced_request(&amounts);
        request.transaction_date = today().checked_add_days(Days::new(days_ahead)).unwrap();
        let result = BalanceValidator::new(today(), &[]).validate(&request);
        prop_assert!(matches!(result, Err(LedgerError::FutureDate(_))));
    }
}
