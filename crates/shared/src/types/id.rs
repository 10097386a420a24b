//! Typed IDs for type-safe entity references.
//!
//! Reference data and ledger rows use database sequences (`i64`), so a larger
//! `LedgerEntryId` always means a later insert. Transaction groups use UUID v7.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate UUID-backed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

/// Macro to generate sequence-backed ID wrappers.
macro_rules! sequence_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw sequence value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

typed_id!(TransactionId, "Identifier shared by every entry of one transaction group.");
typed_id!(ProvisioningRunId, "Identifier of one provisioning run.");

sequence_id!(OfficeId, "Unique identifier for an office (branch).");
sequence_id!(AccountId, "Unique identifier for a ledger (GL) account.");
sequence_id!(LedgerEntryId, "Unique identifier for a ledger entry row.");
sequence_id!(AccountingRuleId, "Unique identifier for an accounting rule.");
sequence_id!(ClosureId, "Unique identifier for an accounting closure.");
sequence_id!(UserId, "Unique identifier for the acting user.");

impl From<ProvisioningRunId> for TransactionId {
    fn from(run: ProvisioningRunId) -> Self {
        Self(run.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
