//! `SeaORM` Entity for accounting_rules table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounting_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub credit_account_id: Option<i64>,
    pub debit_account_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounting_rule_tags::Entity")]
    AccountingRuleTags,
}

impl Related<super::accounting_rule_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountingRuleTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
