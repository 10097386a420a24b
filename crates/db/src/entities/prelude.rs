//! Entity re-exports.

pub use super::account_balance_summaries::Entity as AccountBalanceSummaries;
pub use super::accounting_closures::Entity as AccountingClosures;
pub use super::accounting_rule_tags::Entity as AccountingRuleTags;
pub use super::accounting_rules::Entity as AccountingRules;
pub use super::currencies::Entity as Currencies;
pub use super::financial_activity_accounts::Entity as FinancialActivityAccounts;
pub use super::gl_accounts::Entity as GlAccounts;
pub use super::ledger_entries::Entity as LedgerEntries;
pub use super::offices::Entity as Offices;
