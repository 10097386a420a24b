//! Currency codes and amount scaling.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` scaled to the currency's precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency code (three ASCII letters, stored upper-case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses a currency code, normalising to upper case.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not exactly three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, String> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("Invalid currency code: {code}"));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A currency known to the ledger together with its precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code.
    pub code: CurrencyCode,
    /// Number of decimal places amounts are stored with.
    pub decimal_places: u32,
}

impl Currency {
    /// Creates a new currency.
    #[must_use]
    pub const fn new(code: CurrencyCode, decimal_places: u32) -> Self {
        Self {
            code,
            decimal_places,
        }
    }

    /// Scales an amount to this currency's precision using Banker's Rounding.
    #[must_use]
    pub fn scale(&self, amount: Decimal) -> Decimal {
        scale_amount(amount, self.decimal_places)
    }
}

/// Rounds `amount` to `decimal_places` with Banker's Rounding (half to even).
#[must_use]
pub fn scale_amount(amount: Decimal, decimal_places: u32) -> Decimal {
    amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
#[path = "money_tests.rs"]
mod tests;
