//! Repository abstractions for data access.
//!
//! Repositories implement the ledger engine's storage traits, hiding the
//! `SeaORM` implementation details from the rest of the application.

pub mod account;
mod convert;
pub mod error;
pub mod ledger;

pub use account::AccountRepository;
pub use error::RepositoryError;
pub use ledger::LedgerRepository;
