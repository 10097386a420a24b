//! Initial ledger schema.
//!
//! Creates the reference tables (offices, currencies, chart of accounts,
//! accounting rules, control accounts), accounting closures, the ledger
//! entry table and the derived account balance summaries.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: REFERENCE DATA
        // ============================================================
        db.execute_unprepared(OFFICES_SQL).await?;
        db.execute_unprepared(CURRENCIES_SQL).await?;
        db.execute_unprepared(GL_ACCOUNTS_SQL).await?;
        db.execute_unprepared(ACCOUNTING_RULES_SQL).await?;
        db.execute_unprepared(FINANCIAL_ACTIVITY_ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: CLOSURES & LEDGER
        // ============================================================
        db.execute_unprepared(ACCOUNTING_CLOSURES_SQL).await?;
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;
        db.execute_unprepared(ACCOUNT_BALANCE_SUMMARIES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 5: SEED DATA
        // ============================================================
        db.execute_unprepared(SEED_CURRENCIES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE gl_account_type AS ENUM ('ASSET', 'LIABILITY', 'EQUITY', 'INCOME', 'EXPENSE');

CREATE TYPE entry_type AS ENUM ('DEBIT', 'CREDIT');

CREATE TYPE entry_kind AS ENUM ('standard', 'inter_branch', 'opening_balance', 'provisioning');

-- Portfolio subsystems posting through the accounting bridge
CREATE TYPE entity_type AS ENUM ('loan', 'savings', 'client');
";

const OFFICES_SQL: &str = r"
CREATE TABLE offices (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CURRENCIES_SQL: &str = r"
CREATE TABLE currencies (
    code CHAR(3) PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    decimal_places SMALLINT NOT NULL DEFAULT 2,
    CONSTRAINT chk_decimal_places CHECK (decimal_places BETWEEN 0 AND 6)
);
";

const GL_ACCOUNTS_SQL: &str = r"
CREATE TABLE gl_accounts (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    account_type gl_account_type NOT NULL,
    classification VARCHAR(100),
    disabled BOOLEAN NOT NULL DEFAULT false,
    manual_entries_allowed BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_gl_accounts_classification ON gl_accounts(classification);
";

const ACCOUNTING_RULES_SQL: &str = r"
CREATE TABLE accounting_rules (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    credit_account_id BIGINT REFERENCES gl_accounts(id),
    debit_account_id BIGINT REFERENCES gl_accounts(id)
);

CREATE TABLE accounting_rule_tags (
    id BIGSERIAL PRIMARY KEY,
    rule_id BIGINT NOT NULL REFERENCES accounting_rules(id) ON DELETE CASCADE,
    entry_type entry_type NOT NULL,
    tag VARCHAR(100) NOT NULL,
    UNIQUE (rule_id, entry_type, tag)
);
";

const FINANCIAL_ACTIVITY_ACCOUNTS_SQL: &str = r"
CREATE TABLE financial_activity_accounts (
    financial_activity VARCHAR(50) PRIMARY KEY,
    gl_account_id BIGINT NOT NULL REFERENCES gl_accounts(id)
);
";

const ACCOUNTING_CLOSURES_SQL: &str = r"
CREATE TABLE accounting_closures (
    id BIGSERIAL PRIMARY KEY,
    office_id BIGINT NOT NULL REFERENCES offices(id),
    closing_date DATE NOT NULL,
    comments VARCHAR(500),
    created_by BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (office_id, closing_date)
);

CREATE INDEX idx_closures_office_date ON accounting_closures(office_id, closing_date DESC);
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id BIGSERIAL PRIMARY KEY,
    office_id BIGINT NOT NULL REFERENCES offices(id),
    account_id BIGINT NOT NULL REFERENCES gl_accounts(id),
    currency_code CHAR(3) NOT NULL REFERENCES currencies(code),
    transaction_id UUID NOT NULL,
    entry_type entry_type NOT NULL,
    amount NUMERIC(19, 6) NOT NULL,
    transaction_date DATE NOT NULL,
    manual_entry BOOLEAN NOT NULL DEFAULT false,
    kind entry_kind NOT NULL DEFAULT 'standard',
    comments VARCHAR(500),
    reference_number VARCHAR(100),
    is_reversed BOOLEAN NOT NULL DEFAULT false,
    reversal_id BIGINT REFERENCES ledger_entries(id),
    reverses_entry_id BIGINT REFERENCES ledger_entries(id),
    is_reconciled BOOLEAN NOT NULL DEFAULT false,
    running_balance_calculated BOOLEAN NOT NULL DEFAULT false,
    office_running_balance NUMERIC(19, 6),
    organization_running_balance NUMERIC(19, 6),
    entity_type entity_type,
    entity_id BIGINT,
    created_by BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_entity_link CHECK ((entity_type IS NULL) = (entity_id IS NULL))
);

CREATE INDEX idx_le_transaction ON ledger_entries(transaction_id);
CREATE INDEX idx_le_date_id ON ledger_entries(transaction_date, id);
CREATE INDEX idx_le_office_date_id ON ledger_entries(office_id, transaction_date, id);
CREATE INDEX idx_le_uncalculated ON ledger_entries(transaction_date)
    WHERE running_balance_calculated = false;
CREATE INDEX idx_le_account_kind ON ledger_entries(account_id, kind);
CREATE INDEX idx_le_entity ON ledger_entries(entity_type, entity_id)
    WHERE entity_type IS NOT NULL;
CREATE UNIQUE INDEX idx_le_reverses ON ledger_entries(reverses_entry_id)
    WHERE reverses_entry_id IS NOT NULL;
";

const ACCOUNT_BALANCE_SUMMARIES_SQL: &str = r"
CREATE TABLE account_balance_summaries (
    gl_account_id BIGINT PRIMARY KEY REFERENCES gl_accounts(id),
    balance NUMERIC(19, 6) NOT NULL DEFAULT 0,
    last_entry_id BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const TRIGGERS_SQL: &str = r"
-- Ledger rows are never deleted; corrections are reversals.
CREATE OR REPLACE FUNCTION prevent_ledger_entry_delete()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'ledger entries cannot be deleted (entry %)', OLD.id;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_entries_no_delete
    BEFORE DELETE ON ledger_entries
    FOR EACH ROW EXECUTE FUNCTION prevent_ledger_entry_delete();
";

const SEED_CURRENCIES_SQL: &str = r"
INSERT INTO currencies (code, name, decimal_places) VALUES
    ('USD', 'US Dollar', 2),
    ('EUR', 'Euro', 2),
    ('KES', 'Kenyan Shilling', 2),
    ('UGX', 'Ugandan Shilling', 0),
    ('XOF', 'CFA Franc BCEAO', 0),
    ('INR', 'Indian Rupee', 2),
    ('PHP', 'Philippine Peso', 2)
ON CONFLICT (code) DO NOTHING;
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_ledger_entries_no_delete ON ledger_entries;
DROP FUNCTION IF EXISTS prevent_ledger_entry_delete();
DROP TABLE IF EXISTS account_balance_summaries;
DROP TABLE IF EXISTS ledger_entries;
DROP TABLE IF EXISTS accounting_closures;
DROP TABLE IF EXISTS financial_activity_accounts;
DROP TABLE IF EXISTS accounting_rule_tags;
DROP TABLE IF EXISTS accounting_rules;
DROP TABLE IF EXISTS gl_accounts;
DROP TABLE IF EXISTS currencies;
DROP TABLE IF EXISTS offices;
DROP TYPE IF EXISTS entity_type;
DROP TYPE IF EXISTS entry_kind;
DROP TYPE IF EXISTS entry_type;
DROP TYPE IF EXISTS gl_account_type;
";
