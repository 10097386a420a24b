//! Router fixtures over the in-memory ledger.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use ledgerline_core::ledger::{
    AccountType, AccountingRule, FinancialActivity, InMemoryLedger, LedgerAccount,
    LedgerServices, PostingEventBus, RunningBalanceSettings,
};
use ledgerline_shared::types::{AccountId, AccountingRuleId, Currency, CurrencyCode, OfficeId};
use serde_json::Value;
use tower::ServiceExt;

use crate::middleware::ACTING_USER_HEADER;
use crate::{AppState, create_router};

pub const HEAD_OFFICE: i64 = 1;
pub const BRANCH: i64 = 2;
pub const CASH: i64 = 10;
pub const LOANS: i64 = 11;
pub const RESERVE: i64 = 21;
pub const EQUITY: i64 = 30;
pub const FEES: i64 = 40;
pub const PROVISION_EXPENSE: i64 = 50;
pub const INTERBRANCH: i64 = 90;

pub type TestState = AppState<InMemoryLedger, InMemoryLedger>;

fn account(id: i64, account_type: AccountType, tag: Option<&str>) -> LedgerAccount {
    LedgerAccount {
        id: AccountId(id),
        name: format!("GL {id}"),
        account_type,
        classification: tag.map(str::to_owned),
        disabled: false,
        manual_entries_allowed: true,
    }
}

pub fn ledger() -> InMemoryLedger {
    InMemoryLedger::new()
        .with_office(OfficeId(HEAD_OFFICE), "Head Office")
        .with_office(OfficeId(BRANCH), "Branch")
        .with_currency(Currency::new(CurrencyCode::parse("USD").unwrap(), 2))
        .with_account(account(CASH, AccountType::Asset, Some("cash")))
        .with_account(account(LOANS, AccountType::Asset, Some("loans")))
        .with_account(account(RESERVE, AccountType::Liability, None))
        .with_account(account(EQUITY, AccountType::Equity, None))
        .with_account(account(FEES, AccountType::Income, Some("fees")))
        .with_account(account(PROVISION_EXPENSE, AccountType::Expense, None))
        .with_account(account(INTERBRANCH, AccountType::Asset, None))
        .with_rule(AccountingRule {
            id: AccountingRuleId(1),
            name: "Fee collection".into(),
            credit_account: Some(AccountId(FEES)),
            debit_account: None,
            credit_tags: vec![],
            debit_tags: vec!["cash".into()],
        })
        .with_control_account(FinancialActivity::InterBranchTransfer, AccountId(INTERBRANCH))
        .with_control_account(FinancialActivity::OpeningBalanceContra, AccountId(EQUITY))
}

pub fn state() -> TestState {
    let store = Arc::new(ledger());
    AppState::new(LedgerServices::new(
        Arc::clone(&store),
        store,
        RunningBalanceSettings::default(),
        PostingEventBus::new(16),
    ))
}

pub fn app(state: &TestState) -> Router {
    create_router(state.clone())
}

/// Sends a request as user 7 and returns the status and JSON body.
pub async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACTING_USER_HEADER, "7");
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
