//! In-memory repositories
//!
//! All three repository traits backed by maps behind one mutex. Every
//! trait method takes the lock once, so conditional writes are atomic
//! exactly as they are in PostgreSQL. Used for local runs without a
//! database and by the test suites.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tutorhub_types::{
    BillingCycle, NewSubscriptionEvent, OrderId, PageRequest, PendingPlanChange, PlanDraft,
    PlanId, Subscription, SubscriptionEvent, SubscriptionFilter, SubscriptionId,
    SubscriptionPlan, SubscriptionStatus, TutorId,
};

use crate::error::{DbError, DbResult};
use crate::models::event_from_parts;
use crate::repo::{
    CreateSubscription, EventRepository, PlanRepository, StatusChange, SubscriptionRepository,
};

#[derive(Debug, Clone)]
struct StoredPlan {
    plan: SubscriptionPlan,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredSubscription {
    id: SubscriptionId,
    tutor_id: TutorId,
    plan_id: PlanId,
    status: SubscriptionStatus,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at_period_end: bool,
    billing_cycle: BillingCycle,
    payment_order_id: Option<OrderId>,
    pending_change: Option<PendingPlanChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredSubscription {
    fn matches(&self, filter: &SubscriptionFilter) -> bool {
        filter.status.map_or(true, |s| self.status == s)
            && filter.tutor_id.map_or(true, |t| self.tutor_id == t)
            && filter.plan_id.map_or(true, |p| self.plan_id == p)
            && filter.created_from.map_or(true, |from| self.created_at >= from)
            && filter.created_before.map_or(true, |before| self.created_at < before)
    }

    fn set_status(&mut self, to: SubscriptionStatus) -> StatusChange {
        let previous = self.status;
        self.status = to;
        self.updated_at = Utc::now();
        StatusChange {
            id: self.id,
            previous,
            current: to,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    plans: BTreeMap<PlanId, StoredPlan>,
    subscriptions: BTreeMap<SubscriptionId, StoredSubscription>,
    events: Vec<SubscriptionEvent>,
    next_plan_id: i64,
    next_subscription_id: i64,
    next_event_id: i64,
}

impl Inner {
    fn hydrate(&self, stored: &StoredSubscription) -> DbResult<Subscription> {
        let plan = self
            .plans
            .get(&stored.plan_id)
            .map(|p| p.plan.clone())
            .ok_or_else(|| {
                DbError::Decode(format!(
                    "subscription {} references missing plan {}",
                    stored.id, stored.plan_id
                ))
            })?;

        Ok(Subscription {
            id: stored.id,
            tutor_id: stored.tutor_id,
            plan,
            status: stored.status,
            current_period_start: stored.current_period_start,
            current_period_end: stored.current_period_end,
            cancel_at_period_end: stored.cancel_at_period_end,
            billing_cycle: stored.billing_cycle,
            payment_order_id: stored.payment_order_id.clone(),
            pending_change: stored.pending_change,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn by_order_id_mut(&mut self, order_id: &OrderId) -> Option<&mut StoredSubscription> {
        self.subscriptions
            .values_mut()
            .find(|s| s.payment_order_id.as_ref() == Some(order_id))
    }

    fn order_id_taken(&self, order_id: &OrderId, except: Option<SubscriptionId>) -> bool {
        self.subscriptions
            .values()
            .any(|s| Some(s.id) != except && s.payment_order_id.as_ref() == Some(order_id))
    }

    fn live_plan(&self, id: PlanId) -> Option<&StoredPlan> {
        self.plans.get(&id).filter(|p| p.deleted_at.is_none())
    }
}

/// In-memory implementation of every repository trait
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the maps consistent;
        // each method mutates only after all checks pass.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite a subscription's creation time
    pub fn backdate_subscription(&self, id: SubscriptionId, created_at: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        match inner.subscriptions.get_mut(&id) {
            Some(sub) => {
                sub.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<SubscriptionPlan>> {
        Ok(self.lock().live_plan(id).map(|p| p.plan.clone()))
    }

    async fn list(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
        let inner = self.lock();
        let mut plans: Vec<SubscriptionPlan> = inner
            .plans
            .values()
            .filter(|p| p.deleted_at.is_none() && (p.plan.is_active || !active_only))
            .map(|p| p.plan.clone())
            .collect();
        plans.sort_by_key(|p| (p.price_monthly_cents, p.id));
        Ok(plans)
    }

    async fn create(&self, draft: &PlanDraft) -> DbResult<SubscriptionPlan> {
        let mut inner = self.lock();
        inner.next_plan_id += 1;
        let now = Utc::now();
        let plan = SubscriptionPlan {
            id: PlanId(inner.next_plan_id),
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            price_monthly_cents: draft.price_monthly_cents,
            price_annually_cents: draft.price_annually_cents,
            max_courses: draft.max_courses,
            commission_rate: draft.commission_rate,
            features: draft.features.clone(),
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        };
        inner.plans.insert(
            plan.id,
            StoredPlan {
                plan: plan.clone(),
                deleted_at: None,
            },
        );
        Ok(plan)
    }

    async fn update(&self, id: PlanId, draft: &PlanDraft) -> DbResult<Option<SubscriptionPlan>> {
        let mut inner = self.lock();
        let Some(stored) = inner.plans.get_mut(&id).filter(|p| p.deleted_at.is_none()) else {
            return Ok(None);
        };
        let plan = &mut stored.plan;
        plan.name = draft.name.trim().to_string();
        plan.description = draft.description.clone();
        plan.price_monthly_cents = draft.price_monthly_cents;
        plan.price_annually_cents = draft.price_annually_cents;
        plan.max_courses = draft.max_courses;
        plan.commission_rate = draft.commission_rate;
        plan.features = draft.features.clone();
        plan.is_active = draft.is_active;
        plan.updated_at = Utc::now();
        Ok(Some(plan.clone()))
    }

    async fn soft_delete(&self, id: PlanId) -> DbResult<bool> {
        let mut inner = self.lock();
        match inner.plans.get_mut(&id).filter(|p| p.deleted_at.is_none()) {
            Some(stored) => {
                let now = Utc::now();
                stored.plan.is_active = false;
                stored.plan.updated_at = now;
                stored.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        let mut inner = self.lock();

        if !inner.plans.contains_key(&sub.plan_id) {
            return Err(DbError::NotFound);
        }
        if inner.order_id_taken(&sub.payment_order_id, None) {
            return Err(DbError::Conflict(
                "tutor_subscriptions_payment_order_id".to_string(),
            ));
        }
        if let Some(old) = sub.supersedes {
            let still_past_due = inner.subscriptions.get(&old).is_some_and(|s| {
                s.tutor_id == sub.tutor_id && s.status == SubscriptionStatus::PastDue
            });
            if !still_past_due {
                return Err(DbError::Conflict(format!(
                    "subscription {old} is no longer past due"
                )));
            }
        }
        let open = inner.subscriptions.values().any(|s| {
            s.tutor_id == sub.tutor_id
                && s.status != SubscriptionStatus::Canceled
                && Some(s.id) != sub.supersedes
        });
        if open {
            return Err(DbError::Conflict(
                "tutor_subscriptions_one_open_per_tutor".to_string(),
            ));
        }

        if let Some(old) = sub.supersedes {
            if let Some(stored) = inner.subscriptions.get_mut(&old) {
                stored.set_status(SubscriptionStatus::Canceled);
            }
        }

        inner.next_subscription_id += 1;
        let now = Utc::now();
        let stored = StoredSubscription {
            id: SubscriptionId(inner.next_subscription_id),
            tutor_id: sub.tutor_id,
            plan_id: sub.plan_id,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: false,
            billing_cycle: sub.billing_cycle,
            payment_order_id: Some(sub.payment_order_id),
            pending_change: None,
            created_at: now,
            updated_at: now,
        };
        let created = inner.hydrate(&stored)?;
        inner.subscriptions.insert(stored.id, stored);
        Ok(created)
    }

    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        let inner = self.lock();
        inner
            .subscriptions
            .get(&id)
            .map(|s| inner.hydrate(s))
            .transpose()
    }

    async fn find_by_tutor_id(&self, tutor_id: TutorId) -> DbResult<Option<Subscription>> {
        let inner = self.lock();
        inner
            .subscriptions
            .values()
            .filter(|s| s.tutor_id == tutor_id && s.status != SubscriptionStatus::Canceled)
            .max_by_key(|s| (s.created_at, s.id))
            .map(|s| inner.hydrate(s))
            .transpose()
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> DbResult<Option<Subscription>> {
        let inner = self.lock();
        inner
            .subscriptions
            .values()
            .find(|s| s.payment_order_id.as_ref() == Some(order_id))
            .map(|s| inner.hydrate(s))
            .transpose()
    }

    async fn list(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> DbResult<(Vec<Subscription>, i64)> {
        let inner = self.lock();
        let mut matching: Vec<&StoredSubscription> = inner
            .subscriptions
            .values()
            .filter(|s| s.matches(filter))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.page_size() as usize)
            .map(|s| inner.hydrate(s))
            .collect::<DbResult<Vec<_>>>()?;

        Ok((items, total))
    }

    async fn update(&self, sub: &Subscription) -> DbResult<()> {
        let mut inner = self.lock();
        if let Some(order_id) = &sub.payment_order_id {
            if inner.order_id_taken(order_id, Some(sub.id)) {
                return Err(DbError::Conflict(
                    "tutor_subscriptions_payment_order_id".to_string(),
                ));
            }
        }
        let stored = inner
            .subscriptions
            .get_mut(&sub.id)
            .ok_or(DbError::NotFound)?;
        stored.plan_id = sub.plan.id;
        stored.status = sub.status;
        stored.current_period_start = sub.current_period_start;
        stored.current_period_end = sub.current_period_end;
        stored.cancel_at_period_end = sub.cancel_at_period_end;
        stored.billing_cycle = sub.billing_cycle;
        stored.payment_order_id = sub.payment_order_id.clone();
        stored.pending_change = sub.pending_change;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> DbResult<StatusChange> {
        let mut inner = self.lock();
        let tutor_id = inner
            .subscriptions
            .get(&id)
            .map(|s| s.tutor_id)
            .ok_or(DbError::NotFound)?;
        let reopens_second = status != SubscriptionStatus::Canceled
            && inner.subscriptions.values().any(|s| {
                s.id != id && s.tutor_id == tutor_id && s.status != SubscriptionStatus::Canceled
            });
        if reopens_second {
            return Err(DbError::Conflict(
                "tutor_subscriptions_one_open_per_tutor".to_string(),
            ));
        }
        let stored = inner
            .subscriptions
            .get_mut(&id)
            .ok_or(DbError::NotFound)?;
        if status != SubscriptionStatus::Active {
            stored.pending_change = None;
        }
        Ok(stored.set_status(status))
    }

    async fn transition(
        &self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>> {
        let mut inner = self.lock();
        Ok(inner
            .subscriptions
            .get_mut(&id)
            .filter(|s| from.contains(&s.status))
            .map(|s| s.set_status(to)))
    }

    async fn transition_by_order_id(
        &self,
        order_id: &OrderId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>> {
        let mut inner = self.lock();
        Ok(inner
            .by_order_id_mut(order_id)
            .filter(|s| from.contains(&s.status))
            .map(|s| s.set_status(to)))
    }

    async fn set_cancel_at_period_end(&self, id: SubscriptionId, cancel: bool) -> DbResult<bool> {
        let mut inner = self.lock();
        match inner.subscriptions.get_mut(&id) {
            Some(s) if s.cancel_at_period_end != cancel => {
                s.cancel_at_period_end = cancel;
                s.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stage_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        change: PendingPlanChange,
    ) -> DbResult<bool> {
        let mut inner = self.lock();
        if inner.order_id_taken(order_id, Some(id)) {
            return Err(DbError::Conflict(
                "tutor_subscriptions_payment_order_id".to_string(),
            ));
        }
        if !inner.plans.contains_key(&change.plan_id) {
            return Err(DbError::NotFound);
        }
        match inner.subscriptions.get_mut(&id) {
            Some(s) if s.status == SubscriptionStatus::Active => {
                s.payment_order_id = Some(order_id.clone());
                s.pending_change = Some(change);
                s.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut inner = self.lock();
        let Some(s) = inner.subscriptions.get_mut(&id) else {
            return Ok(false);
        };
        if s.status != SubscriptionStatus::Active || s.payment_order_id.as_ref() != Some(order_id)
        {
            return Ok(false);
        }
        let Some(change) = s.pending_change.take() else {
            return Ok(false);
        };
        s.plan_id = change.plan_id;
        s.billing_cycle = change.billing_cycle;
        s.current_period_start = period_start;
        s.current_period_end = period_end;
        s.status = SubscriptionStatus::Active;
        s.updated_at = Utc::now();
        Ok(true)
    }

    async fn discard_plan_change(&self, order_id: &OrderId) -> DbResult<Option<SubscriptionId>> {
        let mut inner = self.lock();
        Ok(inner
            .by_order_id_mut(order_id)
            .filter(|s| s.pending_change.is_some())
            .map(|s| {
                s.pending_change = None;
                s.updated_at = Utc::now();
                s.id
            }))
    }

    async fn find_expiring_soon(&self, days: u32) -> DbResult<Vec<Subscription>> {
        let inner = self.lock();
        let now = Utc::now();
        let horizon = now + Duration::days(i64::from(days));
        let mut expiring: Vec<&StoredSubscription> = inner
            .subscriptions
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && s.current_period_end >= now
                    && s.current_period_end <= horizon
            })
            .collect();
        expiring.sort_by_key(|s| (s.current_period_end, s.id));
        expiring.into_iter().map(|s| inner.hydrate(s)).collect()
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn log_event(&self, event: &NewSubscriptionEvent) -> DbResult<SubscriptionEvent> {
        let mut inner = self.lock();
        if !inner.subscriptions.contains_key(&event.subscription_id) {
            return Err(DbError::NotFound);
        }
        inner.next_event_id += 1;
        let stored = event_from_parts(inner.next_event_id, event, Utc::now());
        inner.events.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_subscription(&self, id: SubscriptionId) -> DbResult<Vec<SubscriptionEvent>> {
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|e| e.subscription_id == id)
            .cloned()
            .collect())
    }
}
