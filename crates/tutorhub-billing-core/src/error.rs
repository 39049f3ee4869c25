//! Billing errors

use thiserror::Error;
use tutorhub_db::DbError;
use tutorhub_types::{DomainError, PlanId, SubscriptionStatus};

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Plan missing or no longer offered
    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    /// Subscription not found
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// No subscription holds the payment order id
    #[error("no subscription for order {0}")]
    OrderNotFound(String),

    /// Tutor already holds a subscription that blocks a new one
    #[error("tutor already has an active subscription")]
    AlreadySubscribed,

    /// The action is not allowed in the subscription's current status
    #[error("cannot {action} a subscription that is {from}")]
    InvalidTransition {
        /// Current status
        from: SubscriptionStatus,
        /// Attempted action
        action: &'static str,
    },

    /// Payment service reports the payment has not completed
    #[error("payment for order {0} has not completed")]
    PaymentNotCompleted(String),

    /// A concurrent write won
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("validation error: {0}")]
    Validation(String),

    /// Payment service could not be reached
    #[error("payment service unavailable: {0}")]
    ProviderUnavailable(String),

    /// Payment service rejected the request or answered garbage
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound(_) | Self::SubscriptionNotFound | Self::OrderNotFound(_)
        )
    }

    /// Check if this is a state conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadySubscribed | Self::InvalidTransition { .. } | Self::Conflict(_)
        )
    }

    /// Check if this is a provider error
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError(_) | Self::ProviderUnavailable(_))
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::PeriodOutOfRange => Self::Internal(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}
