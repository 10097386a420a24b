//! Property-based tests for reversing entries.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use ledgerline_shared::types::{AccountId, CurrencyCode, LedgerEntryId, OfficeId, TransactionId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::entry::{EntryKind, EntryType, LedgerEntry, NewLedgerEntry};
use super::reversal::create_reversing_entries;
use super::validation::ensure_balanced;

fn stored(entry: NewLedgerEntry, id: i64) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId(id),
        office_id: entry.office_id,
        account_id: entry.account_id,
        currency_code: entry.currency_code,
        transaction_id: entry.transaction_id,
        entry_type: entry.entry_type,
        amount: entry.amount,
        transaction_date: entry.transaction_date,
        manual_entry: entry.manual_entry,
        kind: entry.kind,
        comments: entry.comments,
        reference_number: entry.reference_number,
        reversed: false,
        reversal_id: None,
        reverses_entry_id: entry.reverses_entry_id,
        reconciled: false,
        running_balance_calculated: false,
        office_running_balance: None,
        organization_running_balance: None,
        entity: entry.entity,
        created_by: entry.created_by,
        created_at: Utc::now(),
    }
}

/// A balanced group: one debit per amount against a single credit.
fn group(amounts: &[Decimal], day: u32) -> Vec<LedgerEntry> {
    let transaction_id = TransactionId::new();
    let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
    let template = NewLedgerEntry {
        office_id: OfficeId(1),
        account_id: AccountId(10),
        currency_code: CurrencyCode::parse("USD").unwrap(),
        transaction_id,
        entry_type: EntryType::Debit,
        amount: Decimal::ZERO,
        transaction_date: date,
        manual_entry: true,
        kind: EntryKind::Standard,
        comments: None,
        reference_number: None,
        reverses_entry_id: None,
        entity: None,
        created_by: UserId(1),
    };

    let total: Decimal = amounts.iter().copied().sum();
    let mut rows = vec![NewLedgerEntry {
        account_id: AccountId(40),
        entry_type: EntryType::Credit,
        amount: total,
        ..template.clone()
    }];
    rows.extend(amounts.iter().enumerate().map(|(i, amount)| NewLedgerEntry {
        account_id: AccountId(10 + i64::try_from(i).unwrap()),
        amount: *amount,
        ..template.clone()
    }));
    rows.into_iter()
        .zip(1..)
        .map(|(row, id)| stored(row, id))
        .collect()
}

fn amounts() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1i64..10_000_000i64).prop_map(|c| Decimal::new(c, 2)), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Mirrors flip the side and keep amount, account and date.
    #[test]
    fn prop_mirror_flips_side_only(amounts in amounts(), day in 1u32..28) {
        let originals = group(&amounts, day);
        let reversal_id = TransactionId::new();
        let mirrors = create_reversing_entries(&originals, reversal_id, None, UserId(2));

        prop_assert_eq!(mirrors.len(), originals.len());
        for (original, mirror) in originals.iter().zip(&mirrors) {
            prop_assert_eq!(mirror.entry_type, original.entry_type.opposite());
            prop_assert_eq!(mirror.amount, original.amount);
            prop_assert_eq!(mirror.account_id, original.account_id);
            prop_assert_eq!(mirror.transaction_date, original.transaction_date);
            prop_assert_eq!(mirror.transaction_id, reversal_id);
            prop_assert_eq!(mirror.reverses_entry_id, Some(original.id));
            prop_assert_eq!(mirror.created_by, UserId(2));
        }
        prop_assert!(ensure_balanced(&mirrors).is_ok());
    }

    /// Original plus mirror nets to zero on every account.
    #[test]
    fn prop_reversal_nets_to_zero(amounts in amounts(), day in 1u32..28) {
        let originals = group(&amounts, day);
        let mirrors = create_reversing_entries(&originals, TransactionId::new(), Some("undo"), UserId(2));

        let mut net: HashMap<AccountId, Decimal> = HashMap::new();
        for entry in &originals {
            *net.entry(entry.account_id).or_default() += entry.signed_amount();
        }
        for entry in &mirrors {
            *net.entry(entry.account_id).or_default() += entry.signed_amount();
        }
        prop_assert!(net.values().all(Decimal::is_zero));
    }

    /// Reversing the reversal restores every original side.
    #[test]
    fn prop_reversal_is_an_involution(amounts in amounts(), day in 1u32..28) {
        let originals = group(&amounts, day);
        let first: Vec<LedgerEntry> = create_reversing_entries(&originals, TransactionId::new(), None, UserId(2))
            .into_iter()
            .zip(100..)
            .map(|(row, id)| stored(row, id))
            .collect();
        let second = create_reversing_entries(&first, TransactionId::new(), None, UserId(3));

        for (original, again) in originals.iter().zip(&second) {
            prop_assert_eq!(again.entry_type, original.entry_type);
            prop_assert_eq!(again.amount, original.amount);
            prop_assert_eq!(again.account_id, original.account_id);
            prop_assert_eq!(again.kind, original.kind);
        }
    }
}
