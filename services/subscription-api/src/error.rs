//! Error types for the Subscription API service.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tutorhub_billing_core::BillingError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Billing(e) => match e {
                BillingError::PlanNotFound(_)
                | BillingError::SubscriptionNotFound
                | BillingError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                BillingError::AlreadySubscribed
                | BillingError::InvalidTransition { .. }
                | BillingError::Conflict(_) => StatusCode::CONFLICT,
                BillingError::Validation(_) => StatusCode::BAD_REQUEST,
                BillingError::PaymentNotCompleted(_) => StatusCode::PAYMENT_REQUIRED,
                BillingError::ProviderUnavailable(_) | BillingError::ProviderError(_) => {
                    StatusCode::BAD_GATEWAY
                }
                BillingError::Database(_) | BillingError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Billing(e) => match e {
                BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
                BillingError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
                BillingError::OrderNotFound(_) => "ORDER_NOT_FOUND",
                BillingError::AlreadySubscribed => "ALREADY_SUBSCRIBED",
                BillingError::InvalidTransition { .. } => "INVALID_TRANSITION",
                BillingError::Conflict(_) => "CONFLICT",
                BillingError::Validation(_) => "VALIDATION_ERROR",
                BillingError::PaymentNotCompleted(_) => "PAYMENT_NOT_COMPLETED",
                BillingError::ProviderUnavailable(_) => "PAYMENT_SERVICE_UNAVAILABLE",
                BillingError::ProviderError(_) => "PAYMENT_SERVICE_ERROR",
                BillingError::Database(_) | BillingError::Internal(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Message safe to show the caller
    fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "Payment service request failed".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Internal and upstream detail stays in the logs
        if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
