//! `SeaORM` Entity for ledger_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{EntityType, EntryKind, EntryType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub office_id: i64,
    pub account_id: i64,
    pub currency_code: String,
    pub transaction_id: Uuid,
    pub entry_type: EntryType,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub amount: Decimal,
    pub transaction_date: Date,
    pub manual_entry: bool,
    pub kind: EntryKind,
    pub comments: Option<String>,
    pub reference_number: Option<String>,
    pub is_reversed: bool,
    pub reversal_id: Option<i64>,
    pub reverses_entry_id: Option<i64>,
    pub is_reconciled: bool,
    pub running_balance_calculated: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))", nullable)]
    pub office_running_balance: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))", nullable)]
    pub organization_running_balance: Option<Decimal>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offices::Entity",
        from = "Column::OfficeId",
        to = "super::offices::Column::Id"
    )]
    Offices,
    #[sea_orm(
        belongs_to = "super::gl_accounts::Entity",
        from = "Column::AccountId",
        to = "super::gl_accounts::Column::Id"
    )]
    GlAccounts,
}

impl Related<super::offices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offices.def()
    }
}

impl Related<super::gl_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GlAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
