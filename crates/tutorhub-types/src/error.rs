//! Domain validation and parse errors

use thiserror::Error;

/// Errors raised while constructing or parsing domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown subscription status
    #[error("invalid subscription status: {0}")]
    InvalidStatus(String),

    /// Unknown billing cycle
    #[error("invalid billing cycle: {0}")]
    InvalidBillingCycle(String),

    /// Unknown event type
    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    /// Malformed payment order id
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),

    /// A field failed validation
    #[error("{field}: {reason}")]
    Validation {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Period arithmetic overflowed the calendar
    #[error("billing period out of range")]
    PeriodOutOfRange,
}

impl DomainError {
    /// Shorthand for a field validation error
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
