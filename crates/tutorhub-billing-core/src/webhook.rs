//! Payment service webhook handling

use tutorhub_types::SubscriptionId;

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    /// Payment captured
    PaymentCompleted,
    /// Payment attempt failed
    PaymentFailed,
    /// Payer abandoned or the provider voided the payment
    PaymentCanceled,
    /// Unknown event type
    Unknown(String),
}

impl From<&str> for WebhookEventKind {
    fn from(s: &str) -> Self {
        match s {
            "payment.completed" | "payment.success" => Self::PaymentCompleted,
            "payment.failed" | "payment.error" => Self::PaymentFailed,
            "payment.cancelled" | "payment.canceled" => Self::PaymentCanceled,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl WebhookEventKind {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::PaymentCompleted => "completed",
            Self::PaymentFailed => "failed",
            Self::PaymentCanceled => "canceled",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// What a webhook did to the subscription it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// First successful payment, now active
    Activated(SubscriptionId),
    /// Duplicate success notification
    AlreadyActive(SubscriptionId),
    /// Staged plan change applied
    PlanChanged(SubscriptionId),
    /// Initial payment failed
    MarkedPastDue(SubscriptionId),
    /// Initial payment canceled
    Canceled(SubscriptionId),
    /// Payment for a staged plan change failed or was canceled
    PlanChangeDiscarded(SubscriptionId),
    /// Nothing to do
    Ignored(&'static str),
}

impl WebhookOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Activated(_) => "activated",
            Self::AlreadyActive(_) => "already_active",
            Self::PlanChanged(_) => "plan_changed",
            Self::MarkedPastDue(_) => "past_due",
            Self::Canceled(_) => "canceled",
            Self::PlanChangeDiscarded(_) => "plan_change_discarded",
            Self::Ignored(_) => "ignored",
        }
    }
}
