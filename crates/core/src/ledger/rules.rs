//! Accounting rule resolution.
//!
//! A rule either pins a side to one fixed account or restricts it to
//! accounts carrying an eligible classification tag.

use std::collections::HashMap;

use ledgerline_shared::types::AccountId;

use super::error::{LedgerError, LedgerResult};
use super::types::{AccountingRule, LedgerAccount, PostingLine, PostingRequest};

#[derive(Debug, Clone, Copy)]
enum Side {
    Credit,
    Debit,
}

impl Side {
    const fn label(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

/// Checks that a request's accounts satisfy `rule`.
///
/// `accounts` must contain every account named by the request.
///
/// # Errors
///
/// `InvalidAccounts` describing the first side that violates the rule.
pub fn check_rule(
    rule: &AccountingRule,
    request: &PostingRequest,
    accounts: &HashMap<AccountId, LedgerAccount>,
) -> LedgerResult<()> {
    check_side(
        Side::Credit,
        rule.credit_account,
        &rule.credit_tags,
        &request.credits,
        accounts,
    )?;
    check_side(
        Side::Debit,
        rule.debit_account,
        &rule.debit_tags,
        &request.debits,
        accounts,
    )
}

fn check_side(
    side: Side,
    fixed: Option<AccountId>,
    tags: &[String],
    lines: &[PostingLine],
    accounts: &HashMap<AccountId, LedgerAccount>,
) -> LedgerResult<()> {
    if let Some(fixed) = fixed {
        return match lines {
            [only] if only.account_id == Some(fixed) => Ok(()),
            _ => Err(LedgerError::InvalidAccounts(format!(
                "{} side must be a single line on account {fixed}",
                side.label()
            ))),
        };
    }

    for account_id in lines.iter().filter_map(|line| line.account_id) {
        let tagged = accounts
            .get(&account_id)
            .and_then(|account| account.classification.as_deref())
            .is_some_and(|tag| tags.iter().any(|eligible| eligible == tag));
        if !tagged {
            return Err(LedgerError::InvalidAccounts(format!(
                "account {account_id} is not eligible on the {} side",
                side.label()
            )));
        }
    }
    Ok(())
}
