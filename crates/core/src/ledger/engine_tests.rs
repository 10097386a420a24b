//! Engine tests against the in-memory store.

use std::sync::Arc;

use ledgerline_shared::types::{
    AccountId, AccountingRuleId, CurrencyCode, OfficeId, ProvisioningRunId, TransactionId, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use super::entry::{EntityLink, EntityType, EntryKind, EntryType, LedgerEntry};
use super::error::LedgerError;
use super::events::{PostingEvent, PostingEventKind};
use super::memory::InMemoryLedger;
use super::opening_balance::{OpeningBalanceLine, OpeningBalanceRequest};
use super::provisioning::{ProvisioningLine, ProvisioningRun};
use super::running_balance::RunningBalanceSettings;
use super::store::LedgerEntryStore;
use super::test_support::*;
use super::types::{FinancialActivity, PostingContext};

fn office_net(entries: &[LedgerEntry], office: OfficeId) -> Decimal {
    entries
        .iter()
        .filter(|e| e.office_id == office)
        .map(LedgerEntry::signed_amount)
        .sum()
}

fn account_net(entries: &[LedgerEntry], account: AccountId) -> Decimal {
    entries
        .iter()
        .filter(|e| e.account_id == account)
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// `(office running balance, organization running balance)` of an
/// account's entries in `(transaction_date, id)` order.
async fn balances(store: &InMemoryLedger, account: AccountId) -> Vec<(Option<Decimal>, Option<Decimal>)> {
    let mut entries: Vec<LedgerEntry> = store
        .all_entries()
        .await
        .into_iter()
        .filter(|e| e.account_id == account)
        .collect();
    entries.sort_by_key(|e| (e.transaction_date, e.id));
    entries
        .iter()
        .map(|e| (e.office_running_balance, e.organization_running_balance))
        .collect()
}

fn both(values: &[Decimal]) -> Vec<(Option<Decimal>, Option<Decimal>)> {
    values.iter().map(|v| (Some(*v), Some(*v))).collect()
}

/// Cash: D100, C30, D5 on consecutive days.
async fn post_asset_sequence(svc: &Services) {
    let ctx = context();
    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(100), date(2024, 3, 1)), &ctx)
        .await
        .unwrap();
    svc.poster
        .post(&simple(PROVISION_EXPENSE, CASH, dec!(30), date(2024, 3, 2)), &ctx)
        .await
        .unwrap();
    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(5), date(2024, 3, 3)), &ctx)
        .await
        .unwrap();
}

// ============================================================================
// Journal posting
// ============================================================================

#[tokio::test]
async fn test_post_writes_balanced_group() {
    let store = Arc::new(ledger());
    let svc = services(&store);

    let result = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(100), date(2024, 3, 15)), &context())
        .await
        .unwrap();

    assert_eq!(result.office_id, Some(HEAD_OFFICE));
    let entries = svc.transaction(result.transaction_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, EntryType::Credit);
    assert_eq!(entries[0].account_id, FEE_INCOME);
    assert_eq!(entries[1].entry_type, EntryType::Debit);
    assert_eq!(entries[1].account_id, CASH);
    for entry in &entries {
        assert_eq!(entry.amount, dec!(100));
        assert!(!entry.running_balance_calculated);
        assert!(entry.manual_entry);
        assert_eq!(entry.kind, EntryKind::Standard);
        assert_eq!(entry.created_by, UserId(7));
        assert_eq!(entry.comments.as_deref(), Some("Test posting"));
    }
    assert_eq!(office_net(&entries, HEAD_OFFICE), Decimal::ZERO);
}

#[tokio::test]
async fn test_post_publishes_created_event() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let mut created = svc.events.subscribe(&[PostingEventKind::Created]);

    let result = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(12), date(2024, 3, 15)), &context())
        .await
        .unwrap();

    match created.recv().await.unwrap() {
        PostingEvent::Created {
            transaction_id,
            entry_count,
            ..
        } => {
            assert_eq!(transaction_id, result.transaction_id);
            assert_eq!(entry_count, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_interbranch_split_balances_each_office() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let req = request(
        vec![
            line(DEPOSITS, dec!(60), HEAD_OFFICE),
            line(DEPOSITS, dec!(40), BRANCH_B),
        ],
        vec![line(CASH, dec!(100), HEAD_OFFICE)],
    );

    let result = svc.poster.post(&req, &context()).await.unwrap();
    assert_eq!(result.office_id, Some(HEAD_OFFICE));

    let entries = svc.transaction(result.transaction_id).await.unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(office_net(&entries, HEAD_OFFICE), Decimal::ZERO);
    assert_eq!(office_net(&entries, BRANCH_B), Decimal::ZERO);

    let controls: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::InterBranch)
        .collect();
    assert_eq!(controls.len(), 2);
    assert!(controls.iter().all(|e| e.account_id == INTERBRANCH && !e.manual_entry));
    assert!(controls.iter().any(|e| e.office_id == BRANCH_B
        && e.entry_type == EntryType::Debit
        && e.amount == dec!(40)));
    assert!(controls.iter().any(|e| e.office_id == HEAD_OFFICE
        && e.entry_type == EntryType::Credit
        && e.amount == dec!(40)));
}

#[tokio::test]
async fn test_interbranch_needs_control_account() {
    let store = Arc::new(bare_ledger());
    let svc = services(&store);
    let req = request(
        vec![line(DEPOSITS, dec!(25), BRANCH_B)],
        vec![line(CASH, dec!(25), HEAD_OFFICE)],
    );

    let err = svc.poster.post(&req, &context()).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ControlAccountNotConfigured(FinancialActivity::InterBranchTransfer)
    ));
    assert!(store.all_entries().await.is_empty());
}

#[tokio::test]
async fn test_interbranch_control_account_must_be_asset_or_liability() {
    let store = Arc::new(
        bare_ledger().with_control_account(FinancialActivity::InterBranchTransfer, OPENING_EQUITY),
    );
    let svc = services(&store);
    let req = request(
        vec![line(DEPOSITS, dec!(25), BRANCH_C)],
        vec![line(CASH, dec!(25), HEAD_OFFICE)],
    );

    let err = svc.poster.post(&req, &context()).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ContraAccountWrongType { account_id, .. } if account_id == OPENING_EQUITY
    ));
}

#[tokio::test]
async fn test_both_sides_multi_office_rejected() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let req = request(
        vec![
            line(DEPOSITS, dec!(50), HEAD_OFFICE),
            line(DEPOSITS, dec!(50), BRANCH_B),
        ],
        vec![
            line(CASH, dec!(70), HEAD_OFFICE),
            line(CASH, dec!(30), BRANCH_C),
        ],
    );

    let err = svc.poster.post(&req, &context()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidOffices));
}

#[tokio::test]
async fn test_account_state_checks() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let on = date(2024, 3, 15);

    let err = svc
        .poster
        .post(&simple(AccountId(999), FEE_INCOME, dec!(1), on), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(AccountId(999))));

    let err = svc
        .poster
        .post(&simple(DORMANT, FEE_INCOME, dec!(1), on), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountDisabled(id) if id == DORMANT));

    let err = svc
        .poster
        .post(&simple(PETTY_CASH, FEE_INCOME, dec!(1), on), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ManualEntriesNotPermitted(id) if id == PETTY_CASH));

    let mut system = simple(PETTY_CASH, FEE_INCOME, dec!(1), on);
    system.manual = false;
    assert!(svc.poster.post(&system, &ctx).await.is_ok());
}

#[tokio::test]
async fn test_unknown_office_and_currency() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let req = request(
        vec![line(FEE_INCOME, dec!(5), OfficeId(99))],
        vec![line(CASH, dec!(5), OfficeId(99))],
    );
    let err = svc.poster.post(&req, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::OfficeNotFound(OfficeId(99))));

    let mut req = simple(CASH, FEE_INCOME, dec!(5), date(2024, 3, 15));
    req.currency_code = CurrencyCode::parse("EUR").unwrap();
    let err = svc.poster.post(&req, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::CurrencyNotFound(code) if code == "EUR"));
}

#[tokio::test]
async fn test_accounting_rule_resolution() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let on = date(2024, 3, 15);

    let mut ok = simple(CASH, FEE_INCOME, dec!(3), on);
    ok.accounting_rule_id = Some(FEE_RULE);
    assert!(svc.poster.post(&ok, &ctx).await.is_ok());

    let mut wrong_tag = simple(LOANS, FEE_INCOME, dec!(3), on);
    wrong_tag.accounting_rule_id = Some(FEE_RULE);
    let err = svc.poster.post(&wrong_tag, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccounts(_)));

    let mut unknown = simple(CASH, FEE_INCOME, dec!(3), on);
    unknown.accounting_rule_id = Some(AccountingRuleId(5));
    let err = svc.poster.post(&unknown, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountingRuleNotFound(AccountingRuleId(5))));
}

#[tokio::test]
async fn test_closure_enforced_on_and_before_closing_date() {
    let store = Arc::new(ledger().with_closure(HEAD_OFFICE, date(2024, 1, 31)));
    let svc = services(&store);
    let ctx = context();

    let err = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(5), date(2024, 1, 31)), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::AccountingClosed { office_id, closing_date }
            if office_id == HEAD_OFFICE && closing_date == date(2024, 1, 31)
    ));

    assert!(
        svc.poster
            .post(&simple(CASH, FEE_INCOME, dec!(5), date(2024, 2, 1)), &ctx)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_amounts_scaled_to_currency_precision() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let ugx = CurrencyCode::parse("UGX").unwrap();

    let mut req = simple(CASH, FEE_INCOME, dec!(1500.5), date(2024, 3, 15));
    req.currency_code = ugx.clone();
    let result = svc.poster.post(&req, &ctx).await.unwrap();
    let entries = svc.transaction(result.transaction_id).await.unwrap();
    assert!(entries.iter().all(|e| e.amount == dec!(1500)));

    // 1.5 + 1.5 rounds to 2 + 2 while 3.0 stays 3.
    let mut req = request(
        vec![
            line(FEE_INCOME, dec!(1.5), HEAD_OFFICE),
            line(FEE_INCOME, dec!(1.5), HEAD_OFFICE),
        ],
        vec![line(CASH, dec!(3.0), HEAD_OFFICE)],
    );
    req.currency_code = ugx.clone();
    let err = svc.poster.post(&req, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::SumMismatch { .. }));

    let mut req = simple(CASH, FEE_INCOME, dec!(0.4), date(2024, 3, 15));
    req.currency_code = ugx;
    let err = svc.poster.post(&req, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountOrAmountEmpty));
}

// ============================================================================
// Reversal
// ============================================================================

#[tokio::test]
async fn test_reversal_mirrors_every_entry() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(100), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();

    let reversal = svc
        .reversals
        .reverse(posted.transaction_id, None, &ctx)
        .await
        .unwrap();
    assert_ne!(reversal, posted.transaction_id);

    let originals = svc.transaction(posted.transaction_id).await.unwrap();
    let mirrors = svc.transaction(reversal).await.unwrap();
    assert_eq!(originals.len(), mirrors.len());
    for (original, mirror) in originals.iter().zip(&mirrors) {
        assert!(original.reversed);
        assert_eq!(original.reversal_id, Some(mirror.id));
        assert_eq!(mirror.reverses_entry_id, Some(original.id));
        assert!(!mirror.reversed);
        assert_eq!(mirror.entry_type, original.entry_type.opposite());
        assert_eq!(mirror.account_id, original.account_id);
        assert_eq!(mirror.office_id, original.office_id);
        assert_eq!(mirror.amount, original.amount);
        assert_eq!(mirror.transaction_date, original.transaction_date);
        assert_eq!(
            mirror.comments.as_deref(),
            Some(
                format!(
                    "Reversal entry for journal entry {} of transaction {}",
                    original.id, original.transaction_id
                )
                .as_str()
            )
        );
    }

    let all = store.all_entries().await;
    assert_eq!(account_net(&all, CASH), Decimal::ZERO);
    assert_eq!(account_net(&all, FEE_INCOME), Decimal::ZERO);
}

#[tokio::test]
async fn test_reversal_twice_is_rejected() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();

    svc.reversals
        .reverse(posted.transaction_id, Some("Duplicate"), &ctx)
        .await
        .unwrap();
    let err = svc
        .reversals
        .reverse(posted.transaction_id, None, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionGroupNotFound(id) if id == posted.transaction_id));

    let err = svc
        .reversals
        .reverse(TransactionId::new(), None, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionGroupNotFound(_)));
}

#[tokio::test]
async fn test_reversing_a_reversal_restores_the_effect() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(100), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();

    let first = svc
        .reversals
        .reverse(posted.transaction_id, Some("Duplicate"), &ctx)
        .await
        .unwrap();
    let mirrors = svc.transaction(first).await.unwrap();
    assert!(mirrors.iter().all(|e| e.comments.as_deref() == Some("Duplicate")));

    svc.reversals.reverse(first, None, &ctx).await.unwrap();

    let all = store.all_entries().await;
    assert_eq!(all.len(), 6);
    assert_eq!(account_net(&all, CASH), dec!(100));
    assert_eq!(account_net(&all, FEE_INCOME), dec!(-100));
}

#[tokio::test]
async fn test_reversal_respects_closure() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 2, 10)), &ctx)
        .await
        .unwrap();
    svc.closures
        .create(HEAD_OFFICE, date(2024, 2, 29), None, ctx.acting_user, ctx.today)
        .await
        .unwrap();

    let err = svc
        .reversals
        .reverse(posted.transaction_id, None, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountingClosed { .. }));
    assert!(
        svc.transaction(posted.transaction_id)
            .await
            .unwrap()
            .iter()
            .all(|e| !e.reversed)
    );
}

#[tokio::test]
async fn test_reversal_publishes_event() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let mut reversed = svc.events.subscribe(&[PostingEventKind::Reversed]);
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();
    let reversal = svc
        .reversals
        .reverse(posted.transaction_id, None, &ctx)
        .await
        .unwrap();

    assert_eq!(
        reversed.recv().await.unwrap(),
        PostingEvent::Reversed {
            original_transaction_id: posted.transaction_id,
            reversal_transaction_id: reversal,
        }
    );
}

#[tokio::test]
async fn test_store_rejects_second_reversal_of_same_entry() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();
    let originals = svc.transaction(posted.transaction_id).await.unwrap();

    let first = super::reversal::create_reversing_entries(
        &originals,
        TransactionId::new(),
        None,
        ctx.acting_user,
    );
    let second = super::reversal::create_reversing_entries(
        &originals,
        TransactionId::new(),
        None,
        ctx.acting_user,
    );
    store.apply(first).await.unwrap();
    let err: LedgerError = store.apply(second).await.unwrap_err().into();
    assert!(matches!(err, LedgerError::AlreadyReversed(_)));
    assert_eq!(store.all_entries().await.len(), 4);
}

// ============================================================================
// Provisioning
// ============================================================================

fn provisioning_line(office: OfficeId, amount: Decimal) -> ProvisioningLine {
    ProvisioningLine {
        office_id: office,
        currency_code: usd(),
        liability_account_id: LOAN_LOSS_RESERVE,
        expense_account_id: PROVISION_EXPENSE,
        reserve_amount: amount,
    }
}

#[tokio::test]
async fn test_provisioning_aggregates_per_account() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let run = ProvisioningRun {
        run_id: ProvisioningRunId::new(),
        date: date(2024, 3, 31),
        lines: vec![
            provisioning_line(HEAD_OFFICE, dec!(100.25)),
            provisioning_line(HEAD_OFFICE, dec!(50.50)),
            provisioning_line(BRANCH_B, dec!(0)),
        ],
    };

    let transaction_id = svc.provisioning.post(&run, &context()).await.unwrap();
    assert_eq!(transaction_id, TransactionId::from(run.run_id));

    let entries = svc.transaction(transaction_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.kind == EntryKind::Provisioning));
    assert!(entries.iter().all(|e| e.amount == dec!(150.75)));
    assert!(entries.iter().any(|e| e.account_id == LOAN_LOSS_RESERVE && e.entry_type == EntryType::Credit));
    assert!(entries.iter().any(|e| e.account_id == PROVISION_EXPENSE && e.entry_type == EntryType::Debit));
}

#[tokio::test]
async fn test_provisioning_looks_up_each_currency_once() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let shillings = ProvisioningLine {
        currency_code: CurrencyCode::parse("UGX").unwrap(),
        ..provisioning_line(HEAD_OFFICE, dec!(500))
    };
    let run = ProvisioningRun {
        run_id: ProvisioningRunId::new(),
        date: date(2024, 3, 31),
        lines: vec![
            provisioning_line(HEAD_OFFICE, dec!(10)),
            provisioning_line(BRANCH_B, dec!(20)),
            shillings,
            provisioning_line(BRANCH_C, dec!(5)),
        ],
    };

    let before = store.currency_lookups();
    let transaction_id = svc.provisioning.post(&run, &context()).await.unwrap();
    assert_eq!(store.currency_lookups() - before, 2);
    assert_eq!(svc.transaction(transaction_id).await.unwrap().len(), 8);

    let unknown = ProvisioningRun {
        run_id: ProvisioningRunId::new(),
        lines: vec![ProvisioningLine {
            currency_code: CurrencyCode::parse("EUR").unwrap(),
            ..provisioning_line(HEAD_OFFICE, dec!(10))
        }],
        ..run
    };
    let err = svc.provisioning.post(&unknown, &context()).await.unwrap_err();
    assert!(matches!(err, LedgerError::CurrencyNotFound(_)));
}

#[tokio::test]
async fn test_provisioning_rerun_replaces_previous_entries() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let run_id = ProvisioningRunId::new();
    let first = ProvisioningRun {
        run_id,
        date: date(2024, 3, 31),
        lines: vec![provisioning_line(HEAD_OFFICE, dec!(100))],
    };
    let second = ProvisioningRun {
        lines: vec![provisioning_line(HEAD_OFFICE, dec!(80))],
        ..first.clone()
    };

    svc.provisioning.post(&first, &ctx).await.unwrap();
    let transaction_id = svc.provisioning.post(&second, &ctx).await.unwrap();

    let group = svc.transaction(transaction_id).await.unwrap();
    assert_eq!(group.len(), 4);
    let live: Vec<&LedgerEntry> = group.iter().filter(|e| !e.reversed).collect();
    assert_eq!(live.len(), 2);
    assert!(live.iter().all(|e| e.amount == dec!(80)));
    assert!(
        group
            .iter()
            .filter(|e| e.reversed)
            .all(|e| e.amount == dec!(100) && e.reversal_id.is_some())
    );

    let all = store.all_entries().await;
    assert_eq!(all.len(), 6);
    assert_eq!(account_net(&all, PROVISION_EXPENSE), dec!(80));
}

#[tokio::test]
async fn test_provisioning_rejects_empty_runs() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    let empty = ProvisioningRun {
        run_id: ProvisioningRunId::new(),
        date: date(2024, 3, 31),
        lines: vec![],
    };
    assert!(matches!(
        svc.provisioning.post(&empty, &ctx).await,
        Err(LedgerError::NoDebitsOrCredits)
    ));

    let zeros = ProvisioningRun {
        lines: vec![provisioning_line(HEAD_OFFICE, Decimal::ZERO)],
        ..empty.clone()
    };
    assert!(matches!(
        svc.provisioning.post(&zeros, &ctx).await,
        Err(LedgerError::NoDebitsOrCredits)
    ));

    let negative = ProvisioningRun {
        lines: vec![provisioning_line(HEAD_OFFICE, dec!(-1))],
        ..empty
    };
    assert!(matches!(
        svc.provisioning.post(&negative, &ctx).await,
        Err(LedgerError::AccountOrAmountEmpty)
    ));
}

// ============================================================================
// Opening balances
// ============================================================================

fn opening_line(account: AccountId, amount: Decimal) -> OpeningBalanceLine {
    OpeningBalanceLine {
        account_id: Some(account),
        amount: Some(amount),
    }
}

fn opening_request(
    credits: Vec<OpeningBalanceLine>,
    debits: Vec<OpeningBalanceLine>,
) -> OpeningBalanceRequest {
    OpeningBalanceRequest {
        office_id: HEAD_OFFICE,
        currency_code: usd(),
        transaction_date: date(2024, 1, 1),
        comments: Some("Migration".into()),
        credits,
        debits,
    }
}

#[tokio::test]
async fn test_opening_balance_posts_line_and_contra() {
    let store = Arc::new(ledger());
    let svc = services(&store);

    let result = svc
        .opening_balances
        .define(
            &opening_request(
                vec![opening_line(DEPOSITS, dec!(300))],
                vec![opening_line(CASH, dec!(500))],
            ),
            &context(),
        )
        .await
        .unwrap();

    let entries = svc.transaction(result.transaction_id).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.kind == EntryKind::OpeningBalance));
    assert_eq!(account_net(&entries, CASH), dec!(500));
    assert_eq!(account_net(&entries, DEPOSITS), dec!(-300));
    assert_eq!(account_net(&entries, OPENING_EQUITY), dec!(-200));
    assert_eq!(office_net(&entries, HEAD_OFFICE), Decimal::ZERO);
}

#[tokio::test]
async fn test_opening_balance_entries_are_system_bookings() {
    let store = Arc::new(ledger());
    let svc = services(&store);

    let result = svc
        .opening_balances
        .define(
            &opening_request(vec![], vec![opening_line(PETTY_CASH, dec!(40))]),
            &context(),
        )
        .await
        .unwrap();

    let entries = svc.transaction(result.transaction_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.manual_entry));
    assert_eq!(account_net(&entries, PETTY_CASH), dec!(40));
    assert_eq!(account_net(&entries, OPENING_EQUITY), dec!(-40));
}

#[tokio::test]
async fn test_opening_balance_redefinition_replaces_previous() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let first = svc
        .opening_balances
        .define(&opening_request(vec![], vec![opening_line(CASH, dec!(500))]), &ctx)
        .await
        .unwrap();
    let second = svc
        .opening_balances
        .define(&opening_request(vec![], vec![opening_line(CASH, dec!(700))]), &ctx)
        .await
        .unwrap();

    assert!(
        svc.transaction(first.transaction_id)
            .await
            .unwrap()
            .iter()
            .all(|e| e.reversed)
    );
    let live = store
        .opening_balance_transactions(OPENING_EQUITY, HEAD_OFFICE)
        .await
        .unwrap();
    assert_eq!(live, vec![second.transaction_id]);

    let all = store.all_entries().await;
    assert_eq!(account_net(&all, CASH), dec!(700));
    assert_eq!(account_net(&all, OPENING_EQUITY), dec!(-700));
}

#[tokio::test]
async fn test_opening_balance_not_allowed_after_other_contra_postings() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    svc.poster
        .post(&simple(CASH, OPENING_EQUITY, dec!(10), date(2024, 3, 1)), &ctx)
        .await
        .unwrap();

    let err = svc
        .opening_balances
        .define(&opening_request(vec![], vec![opening_line(CASH, dec!(5))]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OpeningBalanceNotAllowed(id) if id == OPENING_EQUITY));
}

#[tokio::test]
async fn test_opening_balance_line_checks() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let err = svc
        .opening_balances
        .define(&opening_request(vec![], vec![]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoDebitsOrCredits));

    let err = svc
        .opening_balances
        .define(
            &opening_request(vec![opening_line(OPENING_EQUITY, dec!(5))], vec![]),
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccounts(_)));

    let err = svc
        .opening_balances
        .define(
            &opening_request(
                vec![],
                vec![OpeningBalanceLine {
                    account_id: Some(CASH),
                    amount: None,
                }],
            ),
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountOrAmountEmpty));

    let mut future = opening_request(vec![], vec![opening_line(CASH, dec!(5))]);
    future.transaction_date = date(2024, 4, 1);
    let err = svc.opening_balances.define(&future, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::FutureDate(_)));
}

#[tokio::test]
async fn test_opening_balance_contra_configuration() {
    let ctx = context();

    let store = Arc::new(bare_ledger());
    let err = services(&store)
        .opening_balances
        .define(&opening_request(vec![], vec![opening_line(CASH, dec!(5))]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ControlAccountNotConfigured(FinancialActivity::OpeningBalanceContra)
    ));

    let store = Arc::new(
        bare_ledger().with_control_account(FinancialActivity::OpeningBalanceContra, RETAINED_EARNINGS),
    );
    assert!(
        services(&store)
            .opening_balances
            .define(&opening_request(vec![], vec![opening_line(CASH, dec!(5))]), &ctx)
            .await
            .is_ok()
    );

    let store = Arc::new(
        bare_ledger().with_control_account(FinancialActivity::OpeningBalanceContra, CASH),
    );
    let err = services(&store)
        .opening_balances
        .define(&opening_request(vec![], vec![opening_line(LOANS, dec!(5))]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ContraAccountWrongType { .. }));
}

// ============================================================================
// Running balances
// ============================================================================

#[tokio::test]
async fn test_asset_running_balances() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    post_asset_sequence(&svc).await;

    let report = svc.running_balances.run(None).await.unwrap();
    assert_eq!(report.entries_updated, 6);
    assert_eq!(report.pages, 1);
    assert!(!report.hit_iteration_bound);

    assert_eq!(balances(&store, CASH).await, both(&[dec!(100), dec!(70), dec!(75)]));
    assert_eq!(balances(&store, FEE_INCOME).await, both(&[dec!(100), dec!(105)]));
    assert!(store.all_entries().await.iter().all(|e| e.running_balance_calculated));
}

#[tokio::test]
async fn test_liability_running_balances() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    svc.poster
        .post(&simple(CASH, DEPOSITS, dec!(50), date(2024, 3, 4)), &ctx)
        .await
        .unwrap();
    svc.poster
        .post(&simple(DEPOSITS, CASH, dec!(20), date(2024, 3, 5)), &ctx)
        .await
        .unwrap();

    svc.running_balances.run(None).await.unwrap();
    assert_eq!(balances(&store, DEPOSITS).await, both(&[dec!(50), dec!(30)]));
}

#[tokio::test]
async fn test_running_balance_job_is_idempotent() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    post_asset_sequence(&svc).await;

    svc.running_balances.run(None).await.unwrap();
    let before = store.all_entries().await;
    let report = svc.running_balances.run(None).await.unwrap();

    assert_eq!(report.entries_updated, 0);
    assert_eq!(report.pages, 0);
    assert_eq!(report.derived_accounts_updated, 0);
    assert_eq!(store.all_entries().await, before);
}

#[tokio::test]
async fn test_back_dated_posting_refreshes_later_rows() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    post_asset_sequence(&svc).await;
    svc.running_balances.run(None).await.unwrap();

    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 2, 15)), &context())
        .await
        .unwrap();
    let report = svc.running_balances.run(None).await.unwrap();

    assert_eq!(report.entries_updated, 8);
    assert_eq!(
        balances(&store, CASH).await,
        both(&[dec!(10), dec!(110), dec!(80), dec!(85)])
    );
}

#[tokio::test]
async fn test_office_and_organization_balances_differ_across_offices() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    svc.poster
        .post(&simple(CASH, DEPOSITS, dec!(100), date(2024, 3, 1)), &ctx)
        .await
        .unwrap();
    let branch = request(
        vec![line(DEPOSITS, dec!(40), BRANCH_B)],
        vec![line(CASH, dec!(40), BRANCH_B)],
    );
    svc.poster.post(&branch, &ctx).await.unwrap();

    svc.running_balances.run(None).await.unwrap();

    assert_eq!(
        balances(&store, CASH).await,
        vec![
            (Some(dec!(100)), Some(dec!(100))),
            (Some(dec!(40)), Some(dec!(140))),
        ]
    );
}

#[tokio::test]
async fn test_office_pass_leaves_flag_for_organization_pass() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let req = request(
        vec![
            line(DEPOSITS, dec!(60), HEAD_OFFICE),
            line(DEPOSITS, dec!(40), BRANCH_B),
        ],
        vec![line(CASH, dec!(100), HEAD_OFFICE)],
    );
    svc.poster.post(&req, &context()).await.unwrap();

    let report = svc.running_balances.run(Some(BRANCH_B)).await.unwrap();
    assert_eq!(report.entries_updated, 2);
    assert_eq!(report.derived_accounts_updated, 0);

    let entries = store.all_entries().await;
    for entry in &entries {
        assert!(!entry.running_balance_calculated);
        assert_eq!(entry.organization_running_balance, None);
        if entry.office_id == BRANCH_B {
            assert_eq!(entry.office_running_balance, Some(dec!(40)));
        } else {
            assert_eq!(entry.office_running_balance, None);
        }
    }

    svc.running_balances.run(None).await.unwrap();
    assert!(store.all_entries().await.iter().all(|e| e.running_balance_calculated));
}

#[tokio::test]
async fn test_small_pages_give_same_balances() {
    let store = Arc::new(ledger());
    let settings = RunningBalanceSettings {
        organization_page_size: 2,
        office_page_size: 2,
        flush_batch_size: 1,
        max_iterations: 10_000,
    };
    let svc = services_with(&store, settings);
    post_asset_sequence(&svc).await;

    let report = svc.running_balances.run(None).await.unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.entries_updated, 6);
    assert_eq!(balances(&store, CASH).await, both(&[dec!(100), dec!(70), dec!(75)]));
}

#[tokio::test]
async fn test_iteration_bound_resumes_on_next_run() {
    let store = Arc::new(ledger());
    let settings = RunningBalanceSettings {
        organization_page_size: 1,
        office_page_size: 1,
        flush_batch_size: 1,
        max_iterations: 2,
    };
    let svc = services_with(&store, settings);
    post_asset_sequence(&svc).await;

    let first = svc.running_balances.run(None).await.unwrap();
    assert!(first.hit_iteration_bound);
    assert_eq!(first.entries_updated, 2);

    let mut runs = 1;
    while svc.running_balances.run(None).await.unwrap().hit_iteration_bound {
        runs += 1;
        assert!(runs < 10, "job never finished");
    }
    assert_eq!(balances(&store, CASH).await, both(&[dec!(100), dec!(70), dec!(75)]));
    assert!(store.all_entries().await.iter().all(|e| e.running_balance_calculated));
}

#[tokio::test]
async fn test_bounded_run_after_back_dated_posting_leaves_tail_for_next_run() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    post_asset_sequence(&svc).await;
    svc.running_balances.run(None).await.unwrap();

    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 2, 15)), &context())
        .await
        .unwrap();
    let bounded = services_with(
        &store,
        RunningBalanceSettings {
            organization_page_size: 2,
            office_page_size: 2,
            flush_batch_size: 1,
            max_iterations: 1,
        },
    );
    let first = bounded.running_balances.run(None).await.unwrap();
    assert!(first.hit_iteration_bound);
    assert_eq!(first.entries_updated, 2);
    let flagged: Vec<LedgerEntry> = store
        .all_entries()
        .await
        .into_iter()
        .filter(|e| e.running_balance_calculated)
        .collect();
    assert_eq!(flagged.len(), 2);
    assert!(flagged.iter().all(|e| e.transaction_date == date(2024, 2, 15)));

    let second = svc.running_balances.run(None).await.unwrap();
    assert!(!second.hit_iteration_bound);
    assert_eq!(second.entries_updated, 6);
    assert_eq!(
        balances(&store, CASH).await,
        both(&[dec!(10), dec!(110), dec!(80), dec!(85)])
    );
    assert_eq!(
        balances(&store, FEE_INCOME).await,
        both(&[dec!(10), dec!(110), dec!(115)])
    );
    assert!(store.all_entries().await.iter().all(|e| e.running_balance_calculated));
    assert_eq!(store.derived_balance(CASH).await.unwrap().balance, dec!(85));
}

#[tokio::test]
async fn test_derived_balances_follow_markers() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    post_asset_sequence(&svc).await;

    let report = svc.running_balances.run(None).await.unwrap();
    assert_eq!(report.derived_accounts_updated, 3);
    let cash = store.derived_balance(CASH).await.unwrap();
    assert_eq!(cash.balance, dec!(75));
    let last_cash_id = store
        .all_entries()
        .await
        .iter()
        .filter(|e| e.account_id == CASH)
        .map(|e| e.id)
        .max()
        .unwrap();
    assert_eq!(cash.last_entry_id, last_cash_id);
    assert_eq!(store.derived_balance(FEE_INCOME).await.unwrap().balance, dec!(105));
    assert_eq!(store.derived_balance(PROVISION_EXPENSE).await.unwrap().balance, dec!(30));

    svc.poster
        .post(&simple(PROVISION_EXPENSE, CASH, dec!(25), date(2024, 3, 20)), &context())
        .await
        .unwrap();
    let report = svc.running_balances.run(None).await.unwrap();
    assert_eq!(report.derived_accounts_updated, 2);
    assert_eq!(store.derived_balance(CASH).await.unwrap().balance, dec!(50));
    assert_eq!(store.derived_balance(PROVISION_EXPENSE).await.unwrap().balance, dec!(55));
}

#[tokio::test]
async fn test_derived_balances_wait_for_earlier_uncalculated_rows() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();
    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(100), date(2024, 3, 10)), &ctx)
        .await
        .unwrap();
    svc.poster
        .post(&simple(CASH, FEE_INCOME, dec!(5), date(2024, 3, 1)), &ctx)
        .await
        .unwrap();

    let bounded = services_with(
        &store,
        RunningBalanceSettings {
            organization_page_size: 2,
            office_page_size: 2,
            flush_batch_size: 2,
            max_iterations: 1,
        },
    );
    let report = bounded.running_balances.run(None).await.unwrap();
    assert!(report.hit_iteration_bound);

    let cash: Vec<LedgerEntry> = store
        .all_entries()
        .await
        .into_iter()
        .filter(|e| e.account_id == CASH)
        .collect();
    assert!(!cash[0].running_balance_calculated);
    assert!(cash[1].running_balance_calculated);
    assert_eq!(report.derived_accounts_updated, 0);
    assert!(store.derived_balance(CASH).await.is_none());

    let report = svc.running_balances.run(None).await.unwrap();
    assert_eq!(report.derived_accounts_updated, 2);
    let derived = store.derived_balance(CASH).await.unwrap();
    assert_eq!(derived.balance, dec!(105));
    assert_eq!(derived.last_entry_id, cash[1].id);
    assert_eq!(store.derived_balance(FEE_INCOME).await.unwrap().balance, dec!(105));
}

// ============================================================================
// Reconciliation and closures
// ============================================================================

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let mut reconciled = svc.events.subscribe(&[PostingEventKind::Reconciled]);
    let posted = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(10), date(2024, 3, 10)), &context())
        .await
        .unwrap();

    assert_eq!(svc.reconciliation.reconcile(posted.transaction_id).await.unwrap(), 2);
    assert_eq!(svc.reconciliation.reconcile(posted.transaction_id).await.unwrap(), 2);
    assert!(
        svc.transaction(posted.transaction_id)
            .await
            .unwrap()
            .iter()
            .all(|e| e.reconciled)
    );
    assert_eq!(
        reconciled.recv().await.unwrap(),
        PostingEvent::Reconciled {
            transaction_id: posted.transaction_id
        }
    );

    let err = svc
        .reconciliation
        .reconcile(TransactionId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionGroupNotFound(_)));
}

#[tokio::test]
async fn test_closure_lifecycle() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let PostingContext { acting_user, today } = context();

    svc.closures
        .create(HEAD_OFFICE, date(2024, 1, 31), Some("January".into()), acting_user, today)
        .await
        .unwrap();

    let err = svc
        .closures
        .create(HEAD_OFFICE, date(2024, 1, 31), None, acting_user, today)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ClosureNotAfterLatest { latest, .. } if latest == date(2024, 1, 31)));

    let err = svc
        .closures
        .create(HEAD_OFFICE, date(2024, 4, 1), None, acting_user, today)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::FutureDate(_)));

    let err = svc
        .closures
        .create(OfficeId(99), date(2024, 1, 31), None, acting_user, today)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OfficeNotFound(OfficeId(99))));

    svc.closures
        .create(HEAD_OFFICE, date(2024, 2, 29), None, acting_user, today)
        .await
        .unwrap();
    assert_eq!(
        svc.closures.latest(HEAD_OFFICE).await.unwrap().unwrap().closing_date,
        date(2024, 2, 29)
    );

    let deleted = svc.closures.delete_latest(HEAD_OFFICE).await.unwrap();
    assert_eq!(deleted.closing_date, date(2024, 2, 29));
    assert_eq!(
        svc.closures.latest(HEAD_OFFICE).await.unwrap().unwrap().closing_date,
        date(2024, 1, 31)
    );

    svc.closures.delete_latest(HEAD_OFFICE).await.unwrap();
    let err = svc.closures.delete_latest(HEAD_OFFICE).await.unwrap_err();
    assert!(matches!(err, LedgerError::ClosureNotFound(_)));
    assert!(svc.closures.latest(BRANCH_B).await.unwrap().is_none());
}

// ============================================================================
// Accounting bridge
// ============================================================================

fn bridge_payload(reversed: bool, cash: bool, accrual: bool) -> serde_json::Value {
    json!({
        "officeId": 1,
        "currencyCode": "USD",
        "entityType": "loan",
        "entityId": 42,
        "cashBasedAccountingEnabled": cash,
        "accrualBasedAccountingEnabled": accrual,
        "newTransactions": [{
            "id": 1001,
            "date": "2024-03-10",
            "reversed": reversed,
            "postings": [
                { "debitAccountId": 11, "creditAccountId": 12, "amount": "250.00" },
                { "debitAccountId": 11, "creditAccountId": 40, "amount": "5.00", "accrual": true }
            ]
        }]
    })
}

#[tokio::test]
async fn test_bridge_posts_cash_postings_with_entity_link() {
    let store = Arc::new(ledger());
    let svc = services(&store);

    let outcome = svc
        .bridge
        .process(bridge_payload(false, true, false), &context())
        .await
        .unwrap();
    assert_eq!(outcome.posted.len(), 1);
    assert!(outcome.reversed.is_empty());

    let entries = svc.transaction(outcome.posted[0]).await.unwrap();
    assert_eq!(entries.len(), 2);
    let link = EntityLink {
        entity_type: EntityType::Loan,
        entity_id: 1001,
    };
    assert!(entries.iter().all(|e| e.entity == Some(link) && !e.manual_entry));
    assert_eq!(account_net(&entries, LOANS), dec!(250));
    // Petty cash refuses manual entries but accepts bridge postings.
    assert_eq!(account_net(&entries, PETTY_CASH), dec!(-250));
}

#[tokio::test]
async fn test_bridge_books_accrual_postings_under_accrual_accounting() {
    let store = Arc::new(ledger());
    let svc = services(&store);

    let outcome = svc
        .bridge
        .process(bridge_payload(false, false, true), &context())
        .await
        .unwrap();
    let entries = svc.transaction(outcome.posted[0]).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(account_net(&entries, LOANS), dec!(255));
}

#[tokio::test]
async fn test_bridge_skips_when_accounting_disabled_or_already_booked() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let outcome = svc
        .bridge
        .process(bridge_payload(false, false, false), &ctx)
        .await
        .unwrap();
    assert!(outcome.posted.is_empty());
    assert_eq!(outcome.skipped, 1);
    assert!(store.all_entries().await.is_empty());

    svc.bridge
        .process(bridge_payload(false, true, false), &ctx)
        .await
        .unwrap();
    let resent = svc
        .bridge
        .process(bridge_payload(false, true, false), &ctx)
        .await
        .unwrap();
    assert!(resent.posted.is_empty());
    assert_eq!(resent.skipped, 1);
    assert_eq!(store.all_entries().await.len(), 2);
}

#[tokio::test]
async fn test_bridge_reverses_linked_groups() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let posted = svc
        .bridge
        .process(bridge_payload(false, true, false), &ctx)
        .await
        .unwrap();
    let reversed = svc
        .bridge
        .process(bridge_payload(true, true, false), &ctx)
        .await
        .unwrap();

    assert_eq!(reversed.reversed.len(), 1);
    assert!(
        svc.transaction(posted.posted[0])
            .await
            .unwrap()
            .iter()
            .all(|e| e.reversed)
    );
    let all = store.all_entries().await;
    assert_eq!(account_net(&all, LOANS), Decimal::ZERO);
}

#[tokio::test]
async fn test_bridge_rejects_malformed_payloads() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    let ctx = context();

    let mut unknown_key = bridge_payload(false, true, false);
    unknown_key["shareAccountId"] = json!(5);
    let err = svc.bridge.process(unknown_key, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::BridgePayloadInvalid(_)));

    let mut missing_key = bridge_payload(false, true, false);
    missing_key.as_object_mut().unwrap().remove("officeId");
    let err = svc.bridge.process(missing_key, &ctx).await.unwrap_err();
    assert!(matches!(err, LedgerError::BridgePayloadInvalid(_)));
}

#[tokio::test]
async fn test_disabling_an_account_blocks_new_postings() {
    let store = Arc::new(ledger());
    let svc = services(&store);
    store.set_account_disabled(CASH, true).await;

    let err = svc
        .poster
        .post(&simple(CASH, FEE_INCOME, dec!(1), date(2024, 3, 1)), &context())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountDisabled(id) if id == CASH));

    store.set_account_disabled(CASH, false).await;
    assert!(
        svc.poster
            .post(&simple(CASH, FEE_INCOME, dec!(1), date(2024, 3, 1)), &context())
            .await
            .is_ok()
    );
}
