//! `SeaORM` entity definitions.

pub mod prelude;

pub mod account_balance_summaries;
pub mod accounting_closures;
pub mod accounting_rule_tags;
pub mod accounting_rules;
pub mod currencies;
pub mod financial_activity_accounts;
pub mod gl_accounts;
pub mod ledger_entries;
pub mod offices;
pub mod sea_orm_active_enums;
