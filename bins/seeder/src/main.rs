//! Database seeder for Ledgerline development and testing.
//!
//! Seeds two offices, a small microfinance chart of accounts, a fee
//! collection rule and the control-account mappings the engine needs.
//! Existing rows (matched by name) are left alone, so the seeder can be
//! re-run safely.
//!
//! Usage: cargo run --bin seeder

use std::collections::HashMap;

use chrono::Utc;
use ledgerline_core::ledger::FinancialActivity;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter,
    Set,
};

use ledgerline_db::entities::{
    accounting_rule_tags, accounting_rules, financial_activity_accounts, gl_accounts, offices,
    sea_orm_active_enums::{EntryType, GlAccountType},
};

/// Chart of accounts: (name, type, classification tag).
const ACCOUNTS: &[(&str, GlAccountType, Option<&str>)] = &[
    ("Cash on Hand", GlAccountType::Asset, Some("cash")),
    ("Loan Portfolio", GlAccountType::Asset, Some("loans")),
    ("Inter-Branch Clearing", GlAccountType::Asset, None),
    ("Client Savings", GlAccountType::Liability, Some("deposits")),
    ("Loan Loss Reserve", GlAccountType::Liability, None),
    ("Opening Balance Equity", GlAccountType::Equity, None),
    ("Fee Income", GlAccountType::Income, Some("fees")),
    ("Interest Income", GlAccountType::Income, Some("interest")),
    ("Provisioning Expense", GlAccountType::Expense, None),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Connecting to database...");
    let db = ledgerline_db::connect(&database_url).await?;

    println!("Seeding offices...");
    for name in ["Head Office", "Northern Branch"] {
        seed_office(&db, name).await?;
    }

    println!("Seeding chart of accounts...");
    let mut accounts = HashMap::new();
    for (name, account_type, tag) in ACCOUNTS {
        let id = seed_account(&db, name, *account_type, *tag).await?;
        accounts.insert(*name, id);
    }

    println!("Seeding accounting rules...");
    seed_fee_rule(&db, accounts["Fee Income"]).await?;

    println!("Seeding control accounts...");
    seed_control_account(
        &db,
        FinancialActivity::InterBranchTransfer,
        accounts["Inter-Branch Clearing"],
    )
    .await?;
    seed_control_account(
        &db,
        FinancialActivity::OpeningBalanceContra,
        accounts["Opening Balance Equity"],
    )
    .await?;

    println!("Seeding complete!");
    Ok(())
}

async fn seed_office(db: &DatabaseConnection, name: &str) -> Result<i64, DbErr> {
    if let Some(existing) = offices::Entity::find()
        .filter(offices::Column::Name.eq(name))
        .one(db)
        .await?
    {
        println!("  Office {name} already exists, skipping...");
        return Ok(existing.id);
    }

    let office = offices::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    println!("  Created office: {name}");
    Ok(office.id)
}

async fn seed_account(
    db: &DatabaseConnection,
    name: &str,
    account_type: GlAccountType,
    tag: Option<&str>,
) -> Result<i64, DbErr> {
    if let Some(existing) = gl_accounts::Entity::find()
        .filter(gl_accounts::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(existing.id);
    }

    let account = gl_accounts::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        account_type: Set(account_type),
        classification: Set(tag.map(str::to_string)),
        disabled: Set(false),
        manual_entries_allowed: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    println!("  Created account: {name}");
    Ok(account.id)
}

/// Fee collection: credit is fixed to fee income, debit must be a cash account.
async fn seed_fee_rule(db: &DatabaseConnection, fee_income: i64) -> Result<(), DbErr> {
    let name = "Fee Collection";
    if accounting_rules::Entity::find()
        .filter(accounting_rules::Column::Name.eq(name))
        .one(db)
        .await?
        .is_some()
    {
        println!("  Rule {name} already exists, skipping...");
        return Ok(());
    }

    let rule = accounting_rules::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        credit_account_id: Set(Some(fee_income)),
        debit_account_id: Set(None),
    }
    .insert(db)
    .await?;

    accounting_rule_tags::ActiveModel {
        id: NotSet,
        rule_id: Set(rule.id),
        entry_type: Set(EntryType::Debit),
        tag: Set("cash".to_string()),
    }
    .insert(db)
    .await?;
    println!("  Created rule: {name}");
    Ok(())
}

async fn seed_control_account(
    db: &DatabaseConnection,
    activity: FinancialActivity,
    gl_account_id: i64,
) -> Result<(), DbErr> {
    if financial_activity_accounts::Entity::find_by_id(activity.as_str().to_string())
        .one(db)
        .await?
        .is_some()
    {
        println!("  {} already mapped, skipping...", activity.as_str());
        return Ok(());
    }

    financial_activity_accounts::ActiveModel {
        financial_activity: Set(activity.as_str().to_string()),
        gl_account_id: Set(gl_account_id),
    }
    .insert(db)
    .await?;
    println!("  Mapped {} to account {gl_account_id}", activity.as_str());
    Ok(())
}
