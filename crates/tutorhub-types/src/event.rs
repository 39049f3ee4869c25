//! Subscription lifecycle events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, SubscriptionId, SubscriptionStatus};

/// Kind of lifecycle transition recorded in the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Initiated,
    PaymentConfirmed,
    Canceled,
    CancelScheduled,
    PlanChangeInitiated,
    /// A staged plan change was paid and applied
    PlanChanged,
    PaymentFailed,
    PaymentCanceled,
    StatusChanged,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::Canceled => "canceled",
            Self::CancelScheduled => "cancel_scheduled",
            Self::PlanChangeInitiated => "plan_change_initiated",
            Self::PlanChanged => "plan_changed",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentCanceled => "payment_canceled",
            Self::StatusChanged => "status_changed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "payment_confirmed" => Ok(Self::PaymentConfirmed),
            "canceled" => Ok(Self::Canceled),
            "cancel_scheduled" => Ok(Self::CancelScheduled),
            "plan_change_initiated" => Ok(Self::PlanChangeInitiated),
            "plan_changed" => Ok(Self::PlanChanged),
            "payment_failed" => Ok(Self::PaymentFailed),
            "payment_canceled" => Ok(Self::PaymentCanceled),
            "status_changed" => Ok(Self::StatusChanged),
            other => Err(DomainError::InvalidEventType(other.to_string())),
        }
    }
}

/// Recorded lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub id: i64,
    pub subscription_id: SubscriptionId,
    pub event_type: EventType,
    pub previous_status: Option<SubscriptionStatus>,
    pub current_status: SubscriptionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Event to append to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscriptionEvent {
    pub subscription_id: SubscriptionId,
    pub event_type: EventType,
    pub previous_status: Option<SubscriptionStatus>,
    pub current_status: SubscriptionStatus,
    pub notes: String,
}

impl NewSubscriptionEvent {
    pub fn new(
        subscription_id: SubscriptionId,
        event_type: EventType,
        previous_status: Option<SubscriptionStatus>,
        current_status: SubscriptionStatus,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id,
            event_type,
            previous_status,
            current_status,
            notes: notes.into(),
        }
    }
}
