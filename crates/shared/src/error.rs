//! Application-wide error types.
//!
//! Every ledger failure falls into one of four classes. The class decides the
//! HTTP status; the code string tells the caller what to fix.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Error classes of the ledger taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed or unbalanced input.
    Validation,
    /// A referenced account, office, rule or transaction does not exist.
    Reference,
    /// The ledger's current state forbids the operation.
    State,
    /// Storage failed underneath the ledger.
    Integrity,
}

impl ErrorClass {
    /// Returns the HTTP status code for this class.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Reference => 404,
            Self::State => 422,
            Self::Integrity => 500,
        }
    }
}

/// Application error returned across the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected by a validation rule.
    #[error("Validation error: {message}")]
    Validation {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Referenced resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Business rule violation.
    #[error("Business rule violation: {message}")]
    BusinessRule {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Storage-level failure. The message is generic on purpose.
    #[error("Unknown ledger integrity issue")]
    Integrity,
}

impl AppError {
    /// Builds an error from a class, code and message.
    #[must_use]
    pub fn from_class(class: ErrorClass, code: &'static str, message: String) -> Self {
        match class {
            ErrorClass::Validation => Self::Validation { code, message },
            ErrorClass::Reference => Self::NotFound { code, message },
            ErrorClass::State => Self::BusinessRule { code, message },
            ErrorClass::Integrity => Self::Integrity,
        }
    }

    /// Returns the error class.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } => ErrorClass::Validation,
            Self::NotFound { .. } => ErrorClass::Reference,
            Self::BusinessRule { .. } => ErrorClass::State,
            Self::Integrity => ErrorClass::Integrity,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.class().status_code()
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. }
            | Self::NotFound { code, .. }
            | Self::BusinessRule { code, .. } => *code,
            Self::Integrity => "LEDGER_INTEGRITY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_status_codes() {
        assert_eq!(ErrorClass::Validation.status_code(), 400);
        assert_eq!(ErrorClass::Reference.status_code(), 404);
        assert_eq!(ErrorClass::State.status_code(), 422);
        assert_eq!(ErrorClass::Integrity.status_code(), 500);
    }

    #[test]
    fn test_from_class_keeps_code() {
        let err = AppError::from_class(
            ErrorClass::Validation,
            "FUTURE_DATE",
            "date is in the future".into(),
        );
        assert_eq!(err.error_code(), "FUTURE_DATE");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Validation error: date is in the future");
    }

    #[test]
    fn test_integrity_hides_details() {
        let err = AppError::from_class(
            ErrorClass::Integrity,
            "DATABASE_ERROR",
            "duplicate key value violates unique constraint".into(),
        );
        assert_eq!(err.error_code(), "LEDGER_INTEGRITY");
        assert_eq!(err.to_string(), "Unknown ledger integrity issue");
        assert_eq!(err.class(), ErrorClass::Integrity);
    }

    #[test]
    fn test_reference_and_state_mapping() {
        let not_found =
            AppError::from_class(ErrorClass::Reference, "ACCOUNT_NOT_FOUND", "x".into());
        assert_eq!(not_found.status_code(), 404);
        let state = AppError::from_class(ErrorClass::State, "ACCOUNT_DISABLED", "y".into());
        assert_eq!(state.status_code(), 422);
        assert_eq!(state.to_string(), "Business rule violation: y");
    }
}
