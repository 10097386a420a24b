//! Repository error type.

use ledgerline_core::ledger::StoreError;
use ledgerline_shared::types::LedgerEntryId;
use sea_orm::DbErr;

/// Error types for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A reversal targeted an entry that is already reversed.
    #[error("Ledger entry {0} is already reversed")]
    Conflict(LedgerEntryId),

    /// A stored row does not map onto the domain model.
    #[error("Invalid row in {table}: {message}")]
    Corrupt {
        /// Table the row was read from.
        table: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepositoryError {
    pub(crate) fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(entry_id) => Self::Conflict { entry_id },
            other => Self::Backend(other.to_string()),
        }
    }
}
