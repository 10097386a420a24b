//! Account repository: chart of accounts, offices, currencies, accounting
//! rules, control accounts and closures.

use chrono::Utc;
use ledgerline_core::ledger::types::NewClosure;
use ledgerline_core::ledger::{
    AccountStore, AccountingClosure, AccountingRule, FinancialActivity, LedgerAccount, StoreError,
};
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, ClosureId, Currency, CurrencyCode, OfficeId,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::convert;
use super::error::RepositoryError;
use crate::entities::sea_orm_active_enums::EntryType;
use crate::entities::{
    accounting_closures, accounting_rule_tags, accounting_rules, currencies,
    financial_activity_accounts, gl_accounts, offices,
};

/// Reference data and closures backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load_accounts(&self, ids: &[AccountId]) -> Result<Vec<LedgerAccount>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = gl_accounts::Entity::find()
            .filter(gl_accounts::Column::Id.is_in(ids.iter().map(|id| id.get())))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(convert::account).collect())
    }

    async fn load_rule(&self, id: AccountingRuleId) -> Result<Option<AccountingRule>, RepositoryError> {
        let Some(rule) = accounting_rules::Entity::find_by_id(id.get())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let tags = accounting_rule_tags::Entity::find()
            .filter(accounting_rule_tags::Column::RuleId.eq(rule.id))
            .order_by_asc(accounting_rule_tags::Column::Id)
            .all(&self.db)
            .await?;
        let (credit_tags, debit_tags): (Vec<_>, Vec<_>) = tags
            .into_iter()
            .partition(|tag| tag.entry_type == EntryType::Credit);

        Ok(Some(AccountingRule {
            id,
            name: rule.name,
            credit_account: rule.credit_account_id.map(AccountId),
            debit_account: rule.debit_account_id.map(AccountId),
            credit_tags: credit_tags.into_iter().map(|tag| tag.tag).collect(),
            debit_tags: debit_tags.into_iter().map(|tag| tag.tag).collect(),
        }))
    }

    async fn load_offices(&self, ids: &[OfficeId]) -> Result<Vec<OfficeId>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<i64> = offices::Entity::find()
            .select_only()
            .column(offices::Column::Id)
            .filter(offices::Column::Id.is_in(ids.iter().map(|id| id.get())))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(found.into_iter().map(OfficeId).collect())
    }

    async fn load_currency(&self, code: &CurrencyCode) -> Result<Option<Currency>, RepositoryError> {
        let Some(row) = currencies::Entity::find_by_id(code.as_str().to_owned())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let decimal_places = u32::try_from(row.decimal_places).map_err(|_| {
            RepositoryError::corrupt(
                "currencies",
                format!("negative decimal places for {}", row.code),
            )
        })?;
        Ok(Some(Currency::new(
            convert::currency_code("currencies", &row.code)?,
            decimal_places,
        )))
    }

    async fn load_latest_closures(
        &self,
        office_ids: &[OfficeId],
    ) -> Result<Vec<AccountingClosure>, RepositoryError> {
        if office_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = accounting_closures::Entity::find()
            .filter(
                accounting_closures::Column::OfficeId.is_in(office_ids.iter().map(|id| id.get())),
            )
            .order_by_asc(accounting_closures::Column::OfficeId)
            .order_by_desc(accounting_closures::Column::ClosingDate)
            .all(&self.db)
            .await?;

        let mut latest: Vec<AccountingClosure> = Vec::new();
        for row in rows {
            if latest.last().is_none_or(|c| c.office_id.get() != row.office_id) {
                latest.push(convert::closure(row));
            }
        }
        Ok(latest)
    }

    async fn load_control_account(
        &self,
        activity: FinancialActivity,
    ) -> Result<Option<LedgerAccount>, RepositoryError> {
        let Some(mapping) = financial_activity_accounts::Entity::find_by_id(activity.as_str().to_owned())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(gl_accounts::Entity::find_by_id(mapping.gl_account_id)
            .one(&self.db)
            .await?
            .map(convert::account))
    }

    async fn store_closure(&self, closure: NewClosure) -> Result<AccountingClosure, RepositoryError> {
        let row = accounting_closures::ActiveModel {
            id: NotSet,
            office_id: Set(closure.office_id.get()),
            closing_date: Set(closure.closing_date),
            comments: Set(closure.comments),
            created_by: Set(closure.created_by.get()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(convert::closure(row))
    }

    async fn remove_closure(&self, id: ClosureId) -> Result<bool, RepositoryError> {
        let result = accounting_closures::Entity::delete_by_id(id.get())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

impl AccountStore for AccountRepository {
    async fn find_accounts(&self, ids: &[AccountId]) -> Result<Vec<LedgerAccount>, StoreError> {
        Ok(self.load_accounts(ids).await?)
    }

    async fn find_rule(&self, id: AccountingRuleId) -> Result<Option<AccountingRule>, StoreError> {
        Ok(self.load_rule(id).await?)
    }

    async fn existing_offices(&self, ids: &[OfficeId]) -> Result<Vec<OfficeId>, StoreError> {
        Ok(self.load_offices(ids).await?)
    }

    async fn find_currency(&self, code: &CurrencyCode) -> Result<Option<Currency>, StoreError> {
        Ok(self.load_currency(code).await?)
    }

    async fn latest_closures(
        &self,
        offices: &[OfficeId],
    ) -> Result<Vec<AccountingClosure>, StoreError> {
        Ok(self.load_latest_closures(offices).await?)
    }

    async fn control_account(
        &self,
        activity: FinancialActivity,
    ) -> Result<Option<LedgerAccount>, StoreError> {
        Ok(self.load_control_account(activity).await?)
    }

    async fn insert_closure(&self, closure: NewClosure) -> Result<AccountingClosure, StoreError> {
        Ok(self.store_closure(closure).await?)
    }

    async fn delete_closure(&self, id: ClosureId) -> Result<bool, StoreError> {
        Ok(self.remove_closure(id).await?)
    }
}
