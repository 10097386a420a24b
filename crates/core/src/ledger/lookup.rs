//! Reference-data lookups shared by the posting services.

use std::collections::HashMap;

use ledgerline_shared::types::{AccountId, Currency, CurrencyCode, OfficeId};

use super::error::{LedgerError, LedgerResult};
use super::store::AccountStore;
use super::types::{FinancialActivity, LedgerAccount};

/// Loads a currency or fails with `CurrencyNotFound`.
pub(crate) async fn currency<A: AccountStore>(
    accounts: &A,
    code: &CurrencyCode,
) -> LedgerResult<Currency> {
    accounts
        .find_currency(code)
        .await?
        .ok_or_else(|| LedgerError::CurrencyNotFound(code.to_string()))
}

/// Loads each distinct currency once, failing with `CurrencyNotFound` for
/// the first unknown code.
pub(crate) async fn currencies<'a, A: AccountStore>(
    accounts: &A,
    codes: impl IntoIterator<Item = &'a CurrencyCode>,
) -> LedgerResult<HashMap<CurrencyCode, Currency>> {
    let mut found: HashMap<CurrencyCode, Currency> = HashMap::new();
    for code in codes {
        if !found.contains_key(code) {
            found.insert(code.clone(), currency(accounts, code).await?);
        }
    }
    Ok(found)
}

/// Fails with `OfficeNotFound` for the first unknown office.
pub(crate) async fn ensure_offices<A: AccountStore>(
    accounts: &A,
    offices: &[OfficeId],
) -> LedgerResult<()> {
    let existing = accounts.existing_offices(offices).await?;
    match offices.iter().find(|office| !existing.contains(office)) {
        Some(missing) => Err(LedgerError::OfficeNotFound(*missing)),
        None => Ok(()),
    }
}

/// Loads accounts by id, failing with `AccountNotFound` for the first unknown id.
pub(crate) async fn accounts_by_id<A: AccountStore>(
    accounts: &A,
    ids: &[AccountId],
) -> LedgerResult<HashMap<AccountId, LedgerAccount>> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let found: HashMap<AccountId, LedgerAccount> = accounts
        .find_accounts(&ids)
        .await?
        .into_iter()
        .map(|account| (account.id, account))
        .collect();

    match ids.iter().find(|id| !found.contains_key(id)) {
        Some(missing) => Err(LedgerError::AccountNotFound(*missing)),
        None => Ok(found),
    }
}

/// Rejects disabled accounts, and accounts closed to manual entries when
/// the posting is manual.
pub(crate) fn ensure_postable(account: &LedgerAccount, manual: bool) -> LedgerResult<()> {
    if account.disabled {
        return Err(LedgerError::AccountDisabled(account.id));
    }
    if manual && !account.manual_entries_allowed {
        return Err(LedgerError::ManualEntriesNotPermitted(account.id));
    }
    Ok(())
}

/// Loads the account mapped to `activity` and checks its type.
pub(crate) async fn control_account<A: AccountStore>(
    accounts: &A,
    activity: FinancialActivity,
) -> LedgerResult<LedgerAccount> {
    let account = accounts
        .control_account(activity)
        .await?
        .ok_or(LedgerError::ControlAccountNotConfigured(activity))?;

    if !activity.accepts(account.account_type) {
        return Err(LedgerError::ContraAccountWrongType {
            activity,
            account_id: account.id,
        });
    }
    Ok(account)
}
