//! `SeaORM` Entity for accounting_rule_tags table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::EntryType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounting_rule_tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub rule_id: i64,
    pub entry_type: EntryType,
    pub tag: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounting_rules::Entity",
        from = "Column::RuleId",
        to = "super::accounting_rules::Column::Id",
        on_delete = "Cascade"
    )]
    AccountingRules,
}

impl Related<super::accounting_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountingRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
