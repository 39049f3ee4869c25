//! Shared handler utilities
//!
//! Extractors, response envelopes, input parsing and metrics helpers used
//! across handlers.

use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use tutorhub_types::{BillingCycle, Pagination, SubscriptionStatus};

use crate::error::ApiError;

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejections render as API errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections render as API errors
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejections render as API errors
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

// ============================================================================
// Response Envelopes
// ============================================================================

/// `{"data": ..., "message": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: &'static str) -> Self {
        Self {
            data,
            message: Some(message),
        }
    }
}

/// Paginated list envelope
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Envelope for operations without a payload
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ============================================================================
// Input Validation
// ============================================================================

/// Positive database id from a path segment
pub fn require_id(value: i64, what: &str) -> Result<i64, ApiError> {
    if value <= 0 {
        return Err(ApiError::BadRequest(format!("Invalid {what} ID")));
    }
    Ok(value)
}

pub fn parse_billing_cycle(value: &str) -> Result<BillingCycle, ApiError> {
    value.trim().parse().map_err(|_| {
        ApiError::BadRequest("Billing cycle must be either 'monthly' or 'annually'".into())
    })
}

pub fn parse_status(value: &str) -> Result<SubscriptionStatus, ApiError> {
    value.trim().parse().map_err(|_| {
        ApiError::BadRequest(
            "Status must be one of: active, canceled, past_due, trialing, incomplete".into(),
        )
    })
}

/// Optional numeric query parameter
pub fn parse_query_number<T: std::str::FromStr>(
    value: Option<&str>,
    name: &str,
) -> Result<Option<T>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: {v}"))),
    }
}

/// `YYYY-MM-DD` date query parameter
pub fn parse_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: expected YYYY-MM-DD"))),
    }
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Midnight UTC after `date`, for inclusive end-date filters
pub fn end_of_day_exclusive(date: NaiveDate) -> Result<DateTime<Utc>, ApiError> {
    date.checked_add_days(Days::new(1))
        .map(start_of_day)
        .ok_or_else(|| ApiError::BadRequest("Date out of range".into()))
}

/// Decimal amount ("29.99") to cents
pub fn amount_to_cents(amount: f64, name: &str) -> Result<i64, ApiError> {
    let cents = (amount * 100.0).round();
    if !cents.is_finite() || cents.abs() > 1e15 {
        return Err(ApiError::BadRequest(format!("Invalid {name}")));
    }
    Ok(cents as i64)
}

/// Cents to a decimal amount for responses
pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record HTTP operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "subscription_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

// ============================================================================
// Tests
// ============================================================================
