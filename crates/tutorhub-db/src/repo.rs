//! Repository traits
//!
//! Async persistence interfaces for the plan catalog, subscriptions and
//! the subscription event log. Every conditional write is atomic in the
//! backing store; callers never read-then-write to change status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tutorhub_types::{
    BillingCycle, NewSubscriptionEvent, OrderId, PageRequest, PendingPlanChange, PlanDraft,
    PlanId, Subscription, SubscriptionEvent, SubscriptionFilter, SubscriptionId,
    SubscriptionPlan, SubscriptionStatus, TutorId,
};

use crate::error::DbResult;

/// Plan catalog repository
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find a plan that has not been deleted
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<SubscriptionPlan>>;

    /// List plans that have not been deleted, cheapest first
    async fn list(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>>;

    /// Create a plan
    async fn create(&self, plan: &PlanDraft) -> DbResult<SubscriptionPlan>;

    /// Replace a plan's fields
    async fn update(&self, id: PlanId, plan: &PlanDraft) -> DbResult<Option<SubscriptionPlan>>;

    /// Deactivate and mark a plan deleted. Returns false if no such plan.
    async fn soft_delete(&self, id: PlanId) -> DbResult<bool>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub tutor_id: TutorId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub payment_order_id: OrderId,
    /// Past-due subscription to cancel in the same transaction
    pub supersedes: Option<SubscriptionId>,
}

/// Outcome of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub id: SubscriptionId,
    pub previous: SubscriptionStatus,
    pub current: SubscriptionStatus,
}

/// Subscription repository
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a subscription, first canceling `supersedes` if set.
    ///
    /// Fails with `DbError::Conflict` if the tutor already holds a
    /// non-canceled subscription.
    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription>;

    /// Find a subscription by ID
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>>;

    /// Find the tutor's non-canceled subscription
    async fn find_by_tutor_id(&self, tutor_id: TutorId) -> DbResult<Option<Subscription>>;

    /// Find the subscription holding a payment order id
    async fn find_by_order_id(&self, order_id: &OrderId) -> DbResult<Option<Subscription>>;

    /// One page of subscriptions, newest first, with the total match count
    async fn list(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> DbResult<(Vec<Subscription>, i64)>;

    /// Save every mutable column of a subscription
    async fn update(&self, sub: &Subscription) -> DbResult<()>;

    /// Set status unconditionally. Leaving `active` drops any staged plan change.
    /// Fails with `DbError::NotFound` on zero rows.
    async fn update_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> DbResult<StatusChange>;

    /// Move to `to` only if the current status is one of `from`
    async fn transition(
        &self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>>;

    /// Move the subscription holding `order_id` to `to` only if its status is one of `from`
    async fn transition_by_order_id(
        &self,
        order_id: &OrderId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>>;

    /// Set the cancel-at-period-end flag. Returns false if the flag already had that value.
    async fn set_cancel_at_period_end(&self, id: SubscriptionId, cancel: bool) -> DbResult<bool>;

    /// Stage a plan change on an active subscription under a new payment order id.
    /// Returns false if the subscription is not active.
    async fn stage_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        change: PendingPlanChange,
    ) -> DbResult<bool>;

    /// Apply the change staged under `order_id`: swap plan and cycle, reset the
    /// period and clear the stage. Returns false if nothing is staged under it
    /// or the subscription is no longer active.
    async fn apply_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool>;

    /// Drop the change staged under `order_id`, returning the affected subscription
    async fn discard_plan_change(&self, order_id: &OrderId) -> DbResult<Option<SubscriptionId>>;

    /// Active subscriptions whose period ends within `days` days from now
    async fn find_expiring_soon(&self, days: u32) -> DbResult<Vec<Subscription>>;
}

/// Append-only subscription event log
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append an event
    async fn log_event(&self, event: &NewSubscriptionEvent) -> DbResult<SubscriptionEvent>;

    /// Events for a subscription, oldest first
    async fn list_for_subscription(&self, id: SubscriptionId) -> DbResult<Vec<SubscriptionEvent>>;
}
