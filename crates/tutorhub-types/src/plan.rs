//! Subscription plan catalog types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BillingCycle, DomainError, PlanId};

/// Maximum plan name length
pub const MAX_PLAN_NAME_LEN: usize = 100;

/// Plan catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub description: String,
    /// Monthly price in cents
    pub price_monthly_cents: i64,
    /// Annual price in cents
    pub price_annually_cents: i64,
    pub max_courses: i32,
    /// Platform commission, percent in [0, 100]
    pub commission_rate: f64,
    /// Ordered feature list
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Price for the given billing cycle, in cents
    pub const fn price_for(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.price_monthly_cents,
            BillingCycle::Annually => self.price_annually_cents,
        }
    }
}

/// Plan fields supplied when creating or replacing a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_monthly_cents: i64,
    pub price_annually_cents: i64,
    pub max_courses: i32,
    pub commission_rate: f64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl PlanDraft {
    /// Check the catalog invariants
    pub fn validate(&self) -> Result<(), DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name", "plan name is required"));
        }
        if name.len() > MAX_PLAN_NAME_LEN {
            return Err(DomainError::validation(
                "name",
                format!("plan name too long (max {MAX_PLAN_NAME_LEN} chars)"),
            ));
        }
        if self.price_monthly_cents <= 0 {
            return Err(DomainError::validation(
                "price_monthly_cents",
                "monthly price must be greater than 0",
            ));
        }
        if self.price_annually_cents <= 0 {
            return Err(DomainError::validation(
                "price_annually_cents",
                "annual price must be greater than 0",
            ));
        }
        if self.max_courses <= 0 {
            return Err(DomainError::validation(
                "max_courses",
                "max courses must be greater than 0",
            ));
        }
        // NaN fails both comparisons, so check containment explicitly
        if !(0.0..=100.0).contains(&self.commission_rate) {
            return Err(DomainError::validation(
                "commission_rate",
                "commission rate must be between 0 and 100",
            ));
        }
        Ok(())
    }
}

/// Render cents as a decimal amount with two fraction digits ("29.99")
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
