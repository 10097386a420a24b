//! Ledger entry repository.
//!
//! Every `apply` runs in one database transaction. Reversal targets are
//! flipped with a conditional update (`is_reversed = false`), so two
//! concurrent reversals of the same entry cannot both commit.
//!
//! Entry ids come from a sequence and become visible at commit, so a lower
//! id can appear after a higher one. The derived-balance query waits for
//! in-flight writers under a `SHARE` lock before reading.

use chrono::{NaiveDate, Utc};
use ledgerline_core::ledger::entry::{EntityLink, EntryKind, LedgerEntry, NewLedgerEntry};
use ledgerline_core::ledger::store::{
    AccountMovement, DerivedAccountBalance, EntryCursor, OfficeBalanceSeed,
    OrganizationBalanceSeed, RunningBalanceUpdate,
};
use ledgerline_core::ledger::{LedgerEntryStore, StoreError};
use ledgerline_shared::types::{AccountId, LedgerEntryId, OfficeId, TransactionId};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, NotSet, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set,
    SqlErr, Statement, TransactionTrait, Value,
};
use tracing::debug;
use uuid::Uuid;

use super::convert;
use super::error::RepositoryError;
use crate::entities::sea_orm_active_enums as db;
use crate::entities::{account_balance_summaries, ledger_entries};

const OFFICE_SEEDS_SQL: &str = r"
SELECT DISTINCT ON (office_id, account_id)
       office_id, account_id, office_running_balance AS balance
FROM ledger_entries
WHERE running_balance_calculated
  AND transaction_date < $1
  AND ($2::BIGINT IS NULL OR office_id = $2)
ORDER BY office_id, account_id, transaction_date DESC, id DESC
";

const ORGANIZATION_SEEDS_SQL: &str = r"
SELECT DISTINCT ON (account_id)
       account_id, organization_running_balance AS balance
FROM ledger_entries
WHERE running_balance_calculated
  AND transaction_date < $1
ORDER BY account_id, transaction_date DESC, id DESC
";

const LOCK_ENTRIES_SQL: &str = "LOCK TABLE ledger_entries IN SHARE MODE";

const MOVEMENTS_SQL: &str = r"
WITH pending AS (
    SELECT account_id, MIN(id) AS first_pending_id
    FROM ledger_entries
    WHERE NOT running_balance_calculated
    GROUP BY account_id
)
SELECT e.account_id,
       COALESCE(SUM(e.amount) FILTER (WHERE e.entry_type = 'DEBIT'), 0) AS debit_total,
       COALESCE(SUM(e.amount) FILTER (WHERE e.entry_type = 'CREDIT'), 0) AS credit_total,
       MAX(e.id) AS last_entry_id
FROM ledger_entries e
LEFT JOIN account_balance_summaries s ON s.gl_account_id = e.account_id
LEFT JOIN pending p ON p.account_id = e.account_id
WHERE e.running_balance_calculated
  AND e.id > COALESCE(s.last_entry_id, 0)
  AND (p.first_pending_id IS NULL OR e.id < p.first_pending_id)
GROUP BY e.account_id
ORDER BY e.account_id
";

#[derive(Debug, FromQueryResult)]
struct OfficeSeedRow {
    office_id: i64,
    account_id: i64,
    balance: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct OrganizationSeedRow {
    account_id: i64,
    balance: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct MovementRow {
    account_id: i64,
    debit_total: Decimal,
    credit_total: Decimal,
    last_entry_id: i64,
}

/// Ledger entries backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

fn active_entry(entry: NewLedgerEntry, now: DateTimeWithTimeZone) -> ledger_entries::ActiveModel {
    ledger_entries::ActiveModel {
        id: NotSet,
        office_id: Set(entry.office_id.get()),
        account_id: Set(entry.account_id.get()),
        currency_code: Set(entry.currency_code.as_str().to_owned()),
        transaction_id: Set(entry.transaction_id.into_inner()),
        entry_type: Set(entry.entry_type.into()),
        amount: Set(entry.amount),
        transaction_date: Set(entry.transaction_date),
        manual_entry: Set(entry.manual_entry),
        kind: Set(entry.kind.into()),
        comments: Set(entry.comments),
        reference_number: Set(entry.reference_number),
        is_reversed: Set(false),
        reversal_id: Set(None),
        reverses_entry_id: Set(entry.reverses_entry_id.map(LedgerEntryId::get)),
        is_reconciled: Set(false),
        running_balance_calculated: Set(false),
        office_running_balance: Set(None),
        organization_running_balance: Set(None),
        entity_type: Set(entry.entity.map(|link| link.entity_type.into())),
        entity_id: Set(entry.entity.map(|link| link.entity_id)),
        created_by: Set(entry.created_by.get()),
        created_at: Set(now),
    }
}

fn live_entries() -> Condition {
    Condition::all()
        .add(ledger_entries::Column::IsReversed.eq(false))
        .add(ledger_entries::Column::ReversesEntryId.is_null())
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn insert_entries(
        &self,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let txn = self.db.begin().await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut written = Vec::with_capacity(entries.len());

        for entry in entries {
            let reverses = entry.reverses_entry_id;
            let row = match active_entry(entry, now).insert(&txn).await {
                Ok(row) => row,
                // The unique index on reverses_entry_id caught a concurrent reversal.
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    return Err(reverses.map_or(RepositoryError::Database(err), RepositoryError::Conflict));
                }
                Err(err) => return Err(err.into()),
            };

            if let Some(original) = reverses {
                let result = ledger_entries::Entity::update_many()
                    .col_expr(ledger_entries::Column::IsReversed, Expr::value(true))
                    .col_expr(ledger_entries::Column::ReversalId, Expr::value(row.id))
                    .filter(ledger_entries::Column::Id.eq(original.get()))
                    .filter(ledger_entries::Column::IsReversed.eq(false))
                    .exec(&txn)
                    .await?;
                if result.rows_affected == 0 {
                    txn.rollback().await?;
                    return Err(RepositoryError::Conflict(original));
                }
            }
            written.push(convert::entry(row)?);
        }

        txn.commit().await?;
        debug!(entries = written.len(), "Ledger entries written");
        Ok(written)
    }

    async fn load_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::TransactionId.eq(transaction_id.into_inner()))
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::entry)
            .collect()
    }

    async fn flag_reconciled(&self, transaction_id: TransactionId) -> Result<u64, RepositoryError> {
        let result = ledger_entries::Entity::update_many()
            .col_expr(ledger_entries::Column::IsReconciled, Expr::value(true))
            .filter(ledger_entries::Column::TransactionId.eq(transaction_id.into_inner()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn live_transaction_ids(
        &self,
        condition: Condition,
    ) -> Result<Vec<TransactionId>, RepositoryError> {
        let ids: Vec<Uuid> = ledger_entries::Entity::find()
            .select_only()
            .column(ledger_entries::Column::TransactionId)
            .distinct()
            .filter(condition.add(live_entries()))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().map(TransactionId::from_uuid).collect())
    }

    async fn any_entry_other_than(
        &self,
        account: AccountId,
        kind: EntryKind,
    ) -> Result<bool, RepositoryError> {
        let kind: db::EntryKind = kind.into();
        let found = ledger_entries::Entity::find()
            .select_only()
            .column(ledger_entries::Column::Id)
            .filter(ledger_entries::Column::AccountId.eq(account.get()))
            .filter(ledger_entries::Column::Kind.ne(kind))
            .into_tuple::<i64>()
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    async fn first_uncalculated_date(
        &self,
        office: Option<OfficeId>,
    ) -> Result<Option<NaiveDate>, RepositoryError> {
        Ok(ledger_entries::Entity::find()
            .select_only()
            .column(ledger_entries::Column::TransactionDate)
            .filter(ledger_entries::Column::RunningBalanceCalculated.eq(false))
            .apply_if(office, |query, office| {
                query.filter(ledger_entries::Column::OfficeId.eq(office.get()))
            })
            .order_by_asc(ledger_entries::Column::TransactionDate)
            .into_tuple::<NaiveDate>()
            .one(&self.db)
            .await?)
    }

    async fn clear_calculated_from(&self, from: NaiveDate) -> Result<u64, RepositoryError> {
        let result = ledger_entries::Entity::update_many()
            .col_expr(ledger_entries::Column::RunningBalanceCalculated, Expr::value(false))
            .filter(ledger_entries::Column::RunningBalanceCalculated.eq(true))
            .filter(ledger_entries::Column::TransactionDate.gte(from))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn load_office_seeds(
        &self,
        before: NaiveDate,
        office: Option<OfficeId>,
    ) -> Result<Vec<OfficeBalanceSeed>, RepositoryError> {
        let rows = OfficeSeedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            OFFICE_SEEDS_SQL,
            [Value::from(before), Value::from(office.map(OfficeId::get))],
        ))
        .all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| OfficeBalanceSeed {
                office_id: OfficeId(row.office_id),
                account_id: AccountId(row.account_id),
                balance: row.balance.unwrap_or_default(),
            })
            .collect())
    }

    async fn load_organization_seeds(
        &self,
        before: NaiveDate,
    ) -> Result<Vec<OrganizationBalanceSeed>, RepositoryError> {
        let rows = OrganizationSeedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            ORGANIZATION_SEEDS_SQL,
            [Value::from(before)],
        ))
        .all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| OrganizationBalanceSeed {
                account_id: AccountId(row.account_id),
                balance: row.balance.unwrap_or_default(),
            })
            .collect())
    }

    async fn load_page(
        &self,
        from: NaiveDate,
        cursor: Option<EntryCursor>,
        office: Option<OfficeId>,
        limit: u64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::TransactionDate.gte(from))
            .apply_if(office, |query, office| {
                query.filter(ledger_entries::Column::OfficeId.eq(office.get()))
            })
            .apply_if(cursor, |query, cursor| {
                query.filter(
                    Condition::any()
                        .add(ledger_entries::Column::TransactionDate.gt(cursor.transaction_date))
                        .add(
                            Condition::all()
                                .add(ledger_entries::Column::TransactionDate.eq(cursor.transaction_date))
                                .add(ledger_entries::Column::Id.gt(cursor.entry_id.get())),
                        ),
                )
            })
            .order_by_asc(ledger_entries::Column::TransactionDate)
            .order_by_asc(ledger_entries::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::entry)
            .collect()
    }

    async fn write_running_balances(
        &self,
        updates: &[RunningBalanceUpdate],
    ) -> Result<(), RepositoryError> {
        if updates.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin().await?;
        for update in updates {
            let mut statement = ledger_entries::Entity::update_many()
                .col_expr(
                    ledger_entries::Column::OfficeRunningBalance,
                    Expr::value(update.office_running_balance),
                )
                .filter(ledger_entries::Column::Id.eq(update.entry_id.get()));
            if let Some(balance) = update.organization_running_balance {
                statement = statement.col_expr(
                    ledger_entries::Column::OrganizationRunningBalance,
                    Expr::value(balance),
                );
            }
            if update.mark_calculated {
                statement = statement
                    .col_expr(ledger_entries::Column::RunningBalanceCalculated, Expr::value(true));
            }
            let result = statement.exec(&txn).await?;
            if result.rows_affected == 0 {
                return Err(RepositoryError::corrupt(
                    "ledger_entries",
                    format!("entry {} does not exist", update.entry_id),
                ));
            }
        }
        txn.commit().await?;
        Ok(())
    }

    async fn load_movements(&self) -> Result<Vec<AccountMovement>, RepositoryError> {
        let txn = self.db.begin().await?;
        txn.execute_unprepared(LOCK_ENTRIES_SQL).await?;
        let rows = MovementRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            MOVEMENTS_SQL,
        ))
        .all(&txn)
        .await?;
        txn.commit().await?;
        Ok(rows
            .into_iter()
            .map(|row| AccountMovement {
                account_id: AccountId(row.account_id),
                debit_total: row.debit_total,
                credit_total: row.credit_total,
                last_entry_id: LedgerEntryId(row.last_entry_id),
            })
            .collect())
    }

    async fn load_derived(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<DerivedAccountBalance>, RepositoryError> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = account_balance_summaries::Entity::find()
            .filter(
                account_balance_summaries::Column::GlAccountId
                    .is_in(accounts.iter().map(|id| id.get())),
            )
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| DerivedAccountBalance {
                account_id: AccountId(row.gl_account_id),
                balance: row.balance,
                last_entry_id: LedgerEntryId(row.last_entry_id),
            })
            .collect())
    }

    async fn store_derived(&self, balances: &[DerivedAccountBalance]) -> Result<(), RepositoryError> {
        if balances.is_empty() {
            return Ok(());
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let rows = balances.iter().map(|balance| account_balance_summaries::ActiveModel {
            gl_account_id: Set(balance.account_id.get()),
            balance: Set(balance.balance),
            last_entry_id: Set(balance.last_entry_id.get()),
            updated_at: Set(now),
        });
        account_balance_summaries::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::column(account_balance_summaries::Column::GlAccountId)
                    .update_columns([
                        account_balance_summaries::Column::Balance,
                        account_balance_summaries::Column::LastEntryId,
                        account_balance_summaries::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

impl LedgerEntryStore for LedgerRepository {
    async fn apply(&self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.insert_entries(entries).await?)
    }

    async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.load_transaction(transaction_id).await?)
    }

    async fn mark_reconciled(&self, transaction_id: TransactionId) -> Result<u64, StoreError> {
        Ok(self.flag_reconciled(transaction_id).await?)
    }

    async fn opening_balance_transactions(
        &self,
        contra: AccountId,
        office: OfficeId,
    ) -> Result<Vec<TransactionId>, StoreError> {
        let kind: db::EntryKind = EntryKind::OpeningBalance.into();
        let condition = Condition::all()
            .add(ledger_entries::Column::AccountId.eq(contra.get()))
            .add(ledger_entries::Column::OfficeId.eq(office.get()))
            .add(ledger_entries::Column::Kind.eq(kind));
        Ok(self.live_transaction_ids(condition).await?)
    }

    async fn has_entries_other_than(
        &self,
        account: AccountId,
        kind: EntryKind,
    ) -> Result<bool, StoreError> {
        Ok(self.any_entry_other_than(account, kind).await?)
    }

    async fn transactions_for_entity(
        &self,
        entity: EntityLink,
    ) -> Result<Vec<TransactionId>, StoreError> {
        let entity_type: db::EntityType = entity.entity_type.into();
        let condition = Condition::all()
            .add(ledger_entries::Column::EntityType.eq(entity_type))
            .add(ledger_entries::Column::EntityId.eq(entity.entity_id));
        Ok(self.live_transaction_ids(condition).await?)
    }

    async fn earliest_uncalculated_date(
        &self,
        office: Option<OfficeId>,
    ) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.first_uncalculated_date(office).await?)
    }

    async fn reset_calculated_from(&self, from: NaiveDate) -> Result<u64, StoreError> {
        Ok(self.clear_calculated_from(from).await?)
    }

    async fn office_balance_seeds(
        &self,
        before: NaiveDate,
        office: Option<OfficeId>,
    ) -> Result<Vec<OfficeBalanceSeed>, StoreError> {
        Ok(self.load_office_seeds(before, office).await?)
    }

    async fn organization_balance_seeds(
        &self,
        before: NaiveDate,
    ) -> Result<Vec<OrganizationBalanceSeed>, StoreError> {
        Ok(self.load_organization_seeds(before).await?)
    }

    async fn entries_page(
        &self,
        from: NaiveDate,
        cursor: Option<EntryCursor>,
        office: Option<OfficeId>,
        limit: u64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.load_page(from, cursor, office, limit).await?)
    }

    async fn apply_running_balances(
        &self,
        updates: &[RunningBalanceUpdate],
    ) -> Result<(), StoreError> {
        Ok(self.write_running_balances(updates).await?)
    }

    async fn account_movements_since_markers(&self) -> Result<Vec<AccountMovement>, StoreError> {
        Ok(self.load_movements().await?)
    }

    async fn derived_balances(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<DerivedAccountBalance>, StoreError> {
        Ok(self.load_derived(accounts).await?)
    }

    async fn upsert_derived_balances(
        &self,
        balances: &[DerivedAccountBalance],
    ) -> Result<(), StoreError> {
        Ok(self.store_derived(balances).await?)
    }
}
