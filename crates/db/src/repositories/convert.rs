//! Mapping between entity models and ledger domain types.

use chrono::Utc;
use ledgerline_core::ledger::entry::{EntityLink, EntityType, EntryKind, EntryType, LedgerEntry};
use ledgerline_core::ledger::{AccountType, AccountingClosure, LedgerAccount};
use ledgerline_shared::types::{
    AccountId, ClosureId, CurrencyCode, LedgerEntryId, OfficeId, TransactionId, UserId,
};

use super::error::RepositoryError;
use crate::entities::sea_orm_active_enums as db;
use crate::entities::{accounting_closures, gl_accounts, ledger_entries};

impl From<db::GlAccountType> for AccountType {
    fn from(value: db::GlAccountType) -> Self {
        match value {
            db::GlAccountType::Asset => Self::Asset,
            db::GlAccountType::Liability => Self::Liability,
            db::GlAccountType::Equity => Self::Equity,
            db::GlAccountType::Income => Self::Income,
            db::GlAccountType::Expense => Self::Expense,
        }
    }
}

impl From<AccountType> for db::GlAccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Income => Self::Income,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<db::EntryType> for EntryType {
    fn from(value: db::EntryType) -> Self {
        match value {
            db::EntryType::Debit => Self::Debit,
            db::EntryType::Credit => Self::Credit,
        }
    }
}

impl From<EntryType> for db::EntryType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::Debit => Self::Debit,
            EntryType::Credit => Self::Credit,
        }
    }
}

impl From<db::EntryKind> for EntryKind {
    fn from(value: db::EntryKind) -> Self {
        match value {
            db::EntryKind::Standard => Self::Standard,
            db::EntryKind::InterBranch => Self::InterBranch,
            db::EntryKind::OpeningBalance => Self::OpeningBalance,
            db::EntryKind::Provisioning => Self::Provisioning,
        }
    }
}

impl From<EntryKind> for db::EntryKind {
    fn from(value: EntryKind) -> Self {
        match value {
            EntryKind::Standard => Self::Standard,
            EntryKind::InterBranch => Self::InterBranch,
            EntryKind::OpeningBalance => Self::OpeningBalance,
            EntryKind::Provisioning => Self::Provisioning,
        }
    }
}

impl From<db::EntityType> for EntityType {
    fn from(value: db::EntityType) -> Self {
        match value {
            db::EntityType::Loan => Self::Loan,
            db::EntityType::Savings => Self::Savings,
            db::EntityType::Client => Self::Client,
        }
    }
}

impl From<EntityType> for db::EntityType {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Loan => Self::Loan,
            EntityType::Savings => Self::Savings,
            EntityType::Client => Self::Client,
        }
    }
}

pub(crate) fn account(model: gl_accounts::Model) -> LedgerAccount {
    LedgerAccount {
        id: AccountId(model.id),
        name: model.name,
        account_type: model.account_type.into(),
        classification: model.classification,
        disabled: model.disabled,
        manual_entries_allowed: model.manual_entries_allowed,
    }
}

pub(crate) fn closure(model: accounting_closures::Model) -> AccountingClosure {
    AccountingClosure {
        id: ClosureId(model.id),
        office_id: OfficeId(model.office_id),
        closing_date: model.closing_date,
        comments: model.comments,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn currency_code(table: &'static str, raw: &str) -> Result<CurrencyCode, RepositoryError> {
    CurrencyCode::parse(raw).map_err(|message| RepositoryError::corrupt(table, message))
}

pub(crate) fn entry(model: ledger_entries::Model) -> Result<LedgerEntry, RepositoryError> {
    let entity = match (model.entity_type, model.entity_id) {
        (Some(entity_type), Some(entity_id)) => Some(EntityLink {
            entity_type: entity_type.into(),
            entity_id,
        }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::corrupt(
                "ledger_entries",
                format!("entry {} has a partial entity link", model.id),
            ));
        }
    };

    Ok(LedgerEntry {
        id: LedgerEntryId(model.id),
        office_id: OfficeId(model.office_id),
        account_id: AccountId(model.account_id),
        currency_code: currency_code("ledger_entries", &model.currency_code)?,
        transaction_id: TransactionId::from_uuid(model.transaction_id),
        entry_type: model.entry_type.into(),
        amount: model.amount,
        transaction_date: model.transaction_date,
        manual_entry: model.manual_entry,
        kind: model.kind.into(),
        comments: model.comments,
        reference_number: model.reference_number,
        reversed: model.is_reversed,
        reversal_id: model.reversal_id.map(LedgerEntryId),
        reverses_entry_id: model.reverses_entry_id.map(LedgerEntryId),
        reconciled: model.is_reconciled,
        running_balance_calculated: model.running_balance_calculated,
        office_running_balance: model.office_running_balance,
        organization_running_balance: model.organization_running_balance,
        entity,
        created_by: UserId(model.created_by),
        created_at: model.created_at.with_timezone(&Utc),
    })
}
