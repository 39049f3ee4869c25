//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive
//! and convert into the domain types from `tutorhub-types`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tutorhub_types::{
    NewSubscriptionEvent, OrderId, PendingPlanChange, PlanId, Subscription, SubscriptionEvent,
    SubscriptionId, SubscriptionPlan, SubscriptionStatus, TutorId,
};

use crate::error::DbError;

/// Columns selected for a subscription joined with its plan
pub(crate) const SUBSCRIPTION_SELECT: &str = r#"
    SELECT s.id, s.tutor_id, s.plan_id, s.status, s.current_period_start,
           s.current_period_end, s.cancel_at_period_end, s.billing_cycle,
           s.payment_order_id, s.pending_plan_id, s.pending_billing_cycle,
           s.created_at, s.updated_at,
           p.name AS plan_name, p.description AS plan_description,
           p.price_monthly_cents AS plan_price_monthly_cents,
           p.price_annually_cents AS plan_price_annually_cents,
           p.max_courses AS plan_max_courses, p.commission_rate AS plan_commission_rate,
           p.features AS plan_features, p.is_active AS plan_is_active,
           p.created_at AS plan_created_at, p.updated_at AS plan_updated_at
    FROM "TutorSubscriptions" s
    JOIN "SubscriptionPlan" p ON p.id = s.plan_id
"#;

/// Plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_monthly_cents: i64,
    pub price_annually_cents: i64,
    pub max_courses: i32,
    pub commission_rate: f64,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanRow> for SubscriptionPlan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: PlanId(row.id),
            name: row.name,
            description: row.description,
            price_monthly_cents: row.price_monthly_cents,
            price_annually_cents: row.price_annually_cents,
            max_courses: row.max_courses,
            commission_rate: row.commission_rate,
            features: row.features,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Subscription row joined with its plan
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub tutor_id: i64,
    pub plan_id: i64,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub billing_cycle: String,
    pub payment_order_id: Option<String>,
    pub pending_plan_id: Option<i64>,
    pub pending_billing_cycle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub plan_name: String,
    pub plan_description: String,
    pub plan_price_monthly_cents: i64,
    pub plan_price_annually_cents: i64,
    pub plan_max_courses: i32,
    pub plan_commission_rate: f64,
    pub plan_features: Vec<String>,
    pub plan_is_active: bool,
    pub plan_created_at: DateTime<Utc>,
    pub plan_updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let pending_change = match (row.pending_plan_id, row.pending_billing_cycle) {
            (Some(plan_id), Some(cycle)) => Some(PendingPlanChange {
                plan_id: PlanId(plan_id),
                billing_cycle: cycle.parse()?,
            }),
            (None, None) => None,
            _ => {
                return Err(DbError::Decode(format!(
                    "subscription {} has a half-staged plan change",
                    row.id
                )))
            }
        };

        Ok(Self {
            id: SubscriptionId(row.id),
            tutor_id: TutorId(row.tutor_id),
            plan: SubscriptionPlan {
                id: PlanId(row.plan_id),
                name: row.plan_name,
                description: row.plan_description,
                price_monthly_cents: row.plan_price_monthly_cents,
                price_annually_cents: row.plan_price_annually_cents,
                max_courses: row.plan_max_courses,
                commission_rate: row.plan_commission_rate,
                features: row.plan_features,
                is_active: row.plan_is_active,
                created_at: row.plan_created_at,
                updated_at: row.plan_updated_at,
            },
            status: row.status.parse()?,
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
            billing_cycle: row.billing_cycle.parse()?,
            payment_order_id: row
                .payment_order_id
                .as_deref()
                .map(OrderId::parse)
                .transpose()?,
            pending_change,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Subscription event row
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub subscription_id: i64,
    pub event_type: String,
    pub previous_status: Option<String>,
    pub current_status: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for SubscriptionEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            subscription_id: SubscriptionId(row.subscription_id),
            event_type: row.event_type.parse()?,
            previous_status: row.previous_status.as_deref().map(str::parse).transpose()?,
            current_status: row.current_status.parse()?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// Result row of a conditional status update
#[derive(Debug, Clone, FromRow)]
pub struct StatusChangeRow {
    pub id: i64,
    pub previous_status: String,
    pub current_status: String,
}

impl TryFrom<StatusChangeRow> for crate::repo::StatusChange {
    type Error = DbError;

    fn try_from(row: StatusChangeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubscriptionId(row.id),
            previous: row.previous_status.parse()?,
            current: row.current_status.parse()?,
        })
    }
}

/// Bind form of a status list for `= ANY($n)`
pub(crate) fn status_names(statuses: &[SubscriptionStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Build a stored event from a new event and its row metadata
pub(crate) fn event_from_parts(
    id: i64,
    event: &NewSubscriptionEvent,
    created_at: DateTime<Utc>,
) -> SubscriptionEvent {
    SubscriptionEvent {
        id,
        subscription_id: event.subscription_id,
        event_type: event.event_type,
        previous_status: event.previous_status,
        current_status: event.current_status,
        notes: event.notes.clone(),
        created_at,
    }
}
