//! Error types for the loan ledger and the tax calculator.
//!
//! Every failure in this crate is a deterministic input or state problem, so
//! all variants are recoverable at the call boundary and nothing is retried.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::loan::LoanStatus;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for ledger and tax operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid bracket table: {0}")]
    BracketConfiguration(#[from] BracketConfigurationError),

    #[error("Cannot change loan status from {from} to {to}")]
    InvalidStatusTransition { from: LoanStatus, to: LoanStatus },

    #[error("Loan {loan_number} is {status} and accepts no further payments")]
    LoanClosed {
        loan_number: String,
        status: LoanStatus,
    },

    #[error("Loan not found: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

/// Field-level validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    #[error("Interest rate must be positive, got {0}")]
    InvalidRate(Decimal),

    #[error("Term must be a positive number of months, got {0}")]
    InvalidTerm(u32),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("'{field}' must not be negative, got {value}")]
    NegativeInput { field: &'static str, value: Decimal },

    #[error("Required field '{0}' is missing")]
    MissingField(String),
}

/// Problems with a tax bracket table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BracketConfigurationError {
    #[error("bracket table is empty")]
    Empty,

    #[error("bracket {index} upper bound {bound} must be positive")]
    NonPositiveBound { index: usize, bound: Decimal },

    #[error("bracket {index} upper bound {bound} does not exceed the previous bound {previous}")]
    NonMonotonic {
        index: usize,
        bound: Decimal,
        previous: Decimal,
    },

    #[error("bracket {index} is open-ended but is not the last bracket")]
    OpenEndedNotLast { index: usize },

    #[error("bracket {index} rate {rate} is outside 0..=1")]
    RateOutOfRange { index: usize, rate: Decimal },
}

impl Error {
    pub(crate) fn invalid_amount(amount: Decimal, reason: impl Into<String>) -> Self {
        Error::Validation(ValidationError::InvalidAmount {
            amount,
            reason: reason.into(),
        })
    }
}
