//! # Error Types Module
//!
//! Structured errors for user input validation and for the currency store
//! back-ends (in-memory, Postgres and the HTTP microservices).

use reqwest::StatusCode;
use thiserror::Error;

use crate::currency_model::CurrencyCode;

/// Rejected user input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    /// Anything that is not exactly three latin letters
    #[error("currency code must be exactly three latin letters")]
    InvalidCurrencyCode,
    /// Text that does not parse as a decimal number
    #[error("not a number")]
    InvalidNumber,
    /// Zero or negative rates and amounts
    #[error("number must be strictly positive")]
    NotPositive,
    /// Result does not fit the decimal range
    #[error("number is too large")]
    TooLarge,
}

/// Failures reported by a currency store or admin gate
#[derive(Debug, Error)]
pub enum StoreError {
    /// Duplicate add
    #[error("currency {0} already exists")]
    AlreadyExists(CurrencyCode),
    /// Unknown code on update, delete or convert
    #[error("currency {0} not found")]
    NotFound(CurrencyCode),
    /// Input rejected by the store boundary
    #[error("invalid input: {0}")]
    Invalid(#[from] InputError),
    /// Postgres unreachable or statement failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Microservice unreachable
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Microservice answered with an unexpected status
    #[error("service responded {status}: {detail}")]
    Service { status: StatusCode, detail: String },
}

impl StoreError {
    /// Whether the failure comes from the transport rather than the data
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Http(_) | StoreError::Service { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let code = CurrencyCode::parse("usd").unwrap();
        assert!(!StoreError::NotFound(code.clone()).is_transport());
        assert!(!StoreError::AlreadyExists(code).is_transport());
        assert!(!StoreError::Invalid(InputError::NotPositive).is_transport());
        assert!(StoreError::Service {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "boom".to_string(),
        }
        .is_transport());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transport());
    }

    #[test]
    fn test_error_message_formatting() {
        let code = CurrencyCode::parse("eur").unwrap();
        assert_eq!(
            StoreError::NotFound(code).to_string(),
            "currency EUR not found"
        );
        assert_eq!(
            InputError::NotPositive.to_string(),
            "number must be strictly positive"
        );
    }
}
