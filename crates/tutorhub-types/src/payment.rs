//! Payment correlation and webhook types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, PlanId, TutorId};

/// Prefix of every subscription payment order id
pub const ORDER_ID_PREFIX: &str = "SUB";

/// Maximum accepted order id length
pub const MAX_ORDER_ID_LEN: usize = 128;

/// Payment order id correlating a payment intent with a subscription.
///
/// Generated ids have the form `SUB-{tutorId}-{planId}-{unixSeconds}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate the order id for a new payment intent
    pub fn generate(tutor_id: TutorId, plan_id: PlanId, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{ORDER_ID_PREFIX}-{tutor_id}-{plan_id}-{}",
            at.timestamp()
        ))
    }

    /// Accept an order id received from a client or the payment service
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::InvalidOrderId("order id is empty".to_string()));
        }
        if value.len() > MAX_ORDER_ID_LEN {
            return Err(DomainError::InvalidOrderId(format!(
                "order id too long (max {MAX_ORDER_ID_LEN} chars)"
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(DomainError::InvalidOrderId(
                "order id contains control characters".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tutor, plan and timestamp encoded in a generated order id
    pub fn components(&self) -> Option<(TutorId, PlanId, i64)> {
        let mut parts = self.0.split('-');
        if parts.next()? != ORDER_ID_PREFIX {
            return None;
        }
        let tutor = parts.next()?.parse().ok()?;
        let plan = parts.next()?.parse().ok()?;
        let ts = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((TutorId(tutor), PlanId(plan), ts))
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment notification pushed by the payment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentWebhookPayload {
    /// Event name, e.g. `payment.completed`
    pub event: String,
    /// Order id of the payment intent
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: String,
    /// Provider payment status, informational
    #[serde(default)]
    pub status: Option<String>,
}
