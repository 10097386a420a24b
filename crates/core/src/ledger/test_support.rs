//! Shared fixtures for the engine tests.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, Currency, CurrencyCode, OfficeId, UserId,
};
use rust_decimal::Decimal;

use super::events::PostingEventBus;
use super::memory::InMemoryLedger;
use super::running_balance::RunningBalanceSettings;
use super::services::LedgerServices;
use super::types::{
    AccountType, AccountingRule, FinancialActivity, LedgerAccount, PostingContext, PostingLine,
    PostingRequest,
};

pub const HEAD_OFFICE: OfficeId = OfficeId(1);
pub const BRANCH_B: OfficeId = OfficeId(2);
pub const BRANCH_C: OfficeId = OfficeId(3);

pub const CASH: AccountId = AccountId(10);
pub const LOANS: AccountId = AccountId(11);
pub const PETTY_CASH: AccountId = AccountId(12);
pub const DORMANT: AccountId = AccountId(13);
pub const DEPOSITS: AccountId = AccountId(20);
pub const LOAN_LOSS_RESERVE: AccountId = AccountId(21);
pub const OPENING_EQUITY: AccountId = AccountId(30);
pub const RETAINED_EARNINGS: AccountId = AccountId(31);
pub const FEE_INCOME: AccountId = AccountId(40);
pub const PROVISION_EXPENSE: AccountId = AccountId(50);
pub const INTERBRANCH: AccountId = AccountId(90);

pub const FEE_RULE: AccountingRuleId = AccountingRuleId(1);

pub type Services = LedgerServices<InMemoryLedger, InMemoryLedger>;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn usd() -> CurrencyCode {
    CurrencyCode::parse("USD").unwrap()
}

pub fn account(id: AccountId, account_type: AccountType, tag: Option<&str>) -> LedgerAccount {
    LedgerAccount {
        id,
        name: format!("GL {id}"),
        account_type,
        classification: tag.map(str::to_owned),
        disabled: false,
        manual_entries_allowed: true,
    }
}

/// Chart of accounts without any control-account mappings.
pub fn bare_ledger() -> InMemoryLedger {
    let mut petty_cash = account(PETTY_CASH, AccountType::Asset, Some("cash"));
    petty_cash.manual_entries_allowed = false;
    let mut dormant = account(DORMANT, AccountType::Asset, None);
    dormant.disabled = true;

    InMemoryLedger::new()
        .with_office(HEAD_OFFICE, "Head Office")
        .with_office(BRANCH_B, "Branch B")
        .with_office(BRANCH_C, "Branch C")
        .with_currency(Currency::new(usd(), 2))
        .with_currency(Currency::new(CurrencyCode::parse("UGX").unwrap(), 0))
        .with_account(account(CASH, AccountType::Asset, Some("cash")))
        .with_account(account(LOANS, AccountType::Asset, Some("loans")))
        .with_account(petty_cash)
        .with_account(dormant)
        .with_account(account(DEPOSITS, AccountType::Liability, Some("deposits")))
        .with_account(account(LOAN_LOSS_RESERVE, AccountType::Liability, None))
        .with_account(account(OPENING_EQUITY, AccountType::Equity, None))
        .with_account(account(RETAINED_EARNINGS, AccountType::Equity, None))
        .with_account(account(FEE_INCOME, AccountType::Income, Some("fees")))
        .with_account(account(PROVISION_EXPENSE, AccountType::Expense, None))
        .with_account(account(INTERBRANCH, AccountType::Asset, None))
        .with_rule(AccountingRule {
            id: FEE_RULE,
            name: "Fee collection".into(),
            credit_account: Some(FEE_INCOME),
            debit_account: None,
            credit_tags: vec![],
            debit_tags: vec!["cash".into()],
        })
}

/// Chart of accounts with both control accounts mapped.
pub fn ledger() -> InMemoryLedger {
    bare_ledger()
        .with_control_account(FinancialActivity::InterBranchTransfer, INTERBRANCH)
        .with_control_account(FinancialActivity::OpeningBalanceContra, OPENING_EQUITY)
}

pub fn services_with(store: &Arc<InMemoryLedger>, settings: RunningBalanceSettings) -> Services {
    LedgerServices::new(
        Arc::clone(store),
        Arc::clone(store),
        settings,
        PostingEventBus::new(64),
    )
}

pub fn services(store: &Arc<InMemoryLedger>) -> Services {
    services_with(store, RunningBalanceSettings::default())
}

pub fn context() -> PostingContext {
    PostingContext {
        acting_user: UserId(7),
        today: date(2024, 3, 31),
    }
}

pub fn line(account: AccountId, amount: Decimal, office: OfficeId) -> PostingLine {
    PostingLine {
        account_id: Some(account),
        amount: Some(amount),
        office_id: office,
        comments: None,
    }
}

pub fn request(credits: Vec<PostingLine>, debits: Vec<PostingLine>) -> PostingRequest {
    PostingRequest {
        currency_code: usd(),
        transaction_date: date(2024, 3, 15),
        comments: Some("Test posting".into()),
        reference_number: None,
        accounting_rule_id: None,
        credits,
        debits,
        entity: None,
        manual: true,
    }
}

/// A single-office posting debiting `debit` and crediting `credit`.
pub fn simple(
    debit: AccountId,
    credit: AccountId,
    amount: Decimal,
    on: NaiveDate,
) -> PostingRequest {
    PostingRequest {
        transaction_date: on,
        ..request(
            vec![line(credit, amount, HEAD_OFFICE)],
            vec![line(debit, amount, HEAD_OFFICE)],
        )
    }
}
