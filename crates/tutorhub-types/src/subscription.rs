//! Subscription types

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, OrderId, PlanId, SubscriptionId, SubscriptionPlan, TutorId};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created, waiting for the first payment
    Incomplete,
    /// In trial period
    Trialing,
    /// Paid and in good standing
    Active,
    /// A payment failed
    PastDue,
    /// Terminal
    Canceled,
}

impl SubscriptionStatus {
    /// Every status a subscription can hold
    pub const ALL: [Self; 5] = [
        Self::Incomplete,
        Self::Trialing,
        Self::Active,
        Self::PastDue,
        Self::Canceled,
    ];

    /// Statuses a successful payment moves to `Active`
    pub const ACTIVATABLE: [Self; 3] = [Self::Incomplete, Self::Trialing, Self::PastDue];

    /// Statuses that are canceled on the spot rather than at period end
    pub const IMMEDIATELY_CANCELABLE: [Self; 2] = [Self::Incomplete, Self::Trialing];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_activatable(&self) -> bool {
        Self::ACTIVATABLE.contains(self)
    }

    pub fn cancels_immediately(&self) -> bool {
        Self::IMMEDIATELY_CANCELABLE.contains(self)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Whether a tutor holding a subscription in this status may start a new one.
    ///
    /// Past-due subscriptions are superseded by the new subscription.
    pub const fn allows_resubscribe(&self) -> bool {
        matches!(self, Self::Canceled | Self::PastDue)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(Self::Incomplete),
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// Billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Annually,
}

impl BillingCycle {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annually => "annually",
        }
    }

    /// Calendar months covered by one period
    pub const fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Annually => 12,
        }
    }

    /// End of a period starting at `start`.
    ///
    /// Month arithmetic clamps to the last day of shorter months
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn period_end(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        start
            .checked_add_months(Months::new(self.months()))
            .ok_or(DomainError::PeriodOutOfRange)
    }

    /// `(start, end)` bounds of a period starting at `start`
    pub fn period_from(
        &self,
        start: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), DomainError> {
        Ok((start, self.period_end(start)?))
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "annually" => Ok(Self::Annually),
            other => Err(DomainError::InvalidBillingCycle(other.to_string())),
        }
    }
}

/// A plan change waiting for its payment to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlanChange {
    /// Plan the subscription moves to once paid
    pub plan_id: PlanId,
    /// Billing cycle the subscription moves to once paid
    pub billing_cycle: BillingCycle,
}

/// Tutor subscription, joined with its current plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub tutor_id: TutorId,
    /// Current plan
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    /// Cancellation requested, effective when the current period ends
    pub cancel_at_period_end: bool,
    pub billing_cycle: BillingCycle,
    /// Order id of the in-flight or most recent payment intent
    pub payment_order_id: Option<OrderId>,
    /// Staged plan change tied to `payment_order_id`
    pub pending_change: Option<PendingPlanChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Price of the current plan for the current billing cycle, in cents
    pub fn price_cents(&self) -> i64 {
        self.plan.price_for(self.billing_cycle)
    }

    /// Whether `order_id` settles the staged plan change rather than the subscription itself
    pub fn is_pending_change_order(&self, order_id: &OrderId) -> bool {
        self.pending_change.is_some() && self.payment_order_id.as_ref() == Some(order_id)
    }
}

/// Filters for listing subscriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub tutor_id: Option<TutorId>,
    pub plan_id: Option<PlanId>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
}
