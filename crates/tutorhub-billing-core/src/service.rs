//! Subscription lifecycle engine
//!
//! Every status change goes through a conditional write in the store, so
//! concurrent client confirmations, webhooks and cancellations resolve to
//! exactly one winner and exactly one audit event.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use tutorhub_db::{
    CreateSubscription, DbError, EventRepository, PlanRepository, StatusChange,
    SubscriptionRepository,
};
use tutorhub_types::{
    BillingCycle, EventType, NewSubscriptionEvent, OrderId, Page, PageRequest,
    PaymentWebhookPayload, PendingPlanChange, PlanId, Subscription, SubscriptionEvent,
    SubscriptionFilter, SubscriptionId, SubscriptionPlan, SubscriptionStatus, TutorId,
};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::events::EventRecorder;
use crate::provider::{PaymentProvider, PaymentRequest};
use crate::webhook::{WebhookEventKind, WebhookOutcome};

/// Longest look-ahead accepted by [`SubscriptionService::expiring_soon`]
pub const MAX_EXPIRING_DAYS: u32 = 365;

/// Request to start a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiateSubscription {
    pub tutor_id: TutorId,
    pub plan_id: PlanId,
    pub billing_cycle: BillingCycle,
}

/// Client-side payment confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPayment {
    pub order_id: OrderId,
    pub payment_id: Option<String>,
    pub payer_id: Option<String>,
}

/// Request to move an active subscription to another plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePlan {
    pub new_plan_id: PlanId,
    pub billing_cycle: BillingCycle,
}

/// A subscription waiting on a payment the tutor has to complete
#[derive(Debug, Clone)]
pub struct Checkout {
    pub subscription: Subscription,
    pub payment_order_id: OrderId,
    pub payment_url: String,
    /// Amount charged by this payment, in cents
    pub amount_cents: i64,
}

/// How a successful payment was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Activated,
    AlreadyActive,
    PlanChanged,
}

/// Subscription lifecycle service
#[derive(Clone)]
pub struct SubscriptionService {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn EventRepository>,
    provider: Arc<dyn PaymentProvider>,
    recorder: EventRecorder,
    config: BillingConfig,
}

impl SubscriptionService {
    /// Create a new subscription service
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn EventRepository>,
        provider: Arc<dyn PaymentProvider>,
        recorder: EventRecorder,
        config: BillingConfig,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            events,
            provider,
            recorder,
            config,
        }
    }

    /// Event recorder used by this service
    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a subscription by ID
    pub async fn get(&self, id: SubscriptionId) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_by_id(id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    /// The tutor's current (non-canceled) subscription
    pub async fn get_for_tutor(&self, tutor_id: TutorId) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_by_tutor_id(tutor_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    /// Filtered, paginated subscription listing
    pub async fn list(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> Result<Page<Subscription>, BillingError> {
        let (items, total) = self.subscriptions.list(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    /// Active subscriptions whose period ends within `days` days
    pub async fn expiring_soon(&self, days: u32) -> Result<Vec<Subscription>, BillingError> {
        if days == 0 || days > MAX_EXPIRING_DAYS {
            return Err(BillingError::Validation(format!(
                "days must be between 1 and {MAX_EXPIRING_DAYS}"
            )));
        }
        Ok(self.subscriptions.find_expiring_soon(days).await?)
    }

    /// Audit trail of a subscription, oldest first
    pub async fn events(&self, id: SubscriptionId) -> Result<Vec<SubscriptionEvent>, BillingError> {
        self.get(id).await?;
        Ok(self.events.list_for_subscription(id).await?)
    }

    // ========================================================================
    // Initiate
    // ========================================================================

    /// Start a subscription: open a payment intent, then persist an
    /// `incomplete` subscription correlated by the intent's order id.
    #[instrument(skip(self), fields(tutor_id = %request.tutor_id, plan_id = %request.plan_id))]
    pub async fn initiate(&self, request: InitiateSubscription) -> Result<Checkout, BillingError> {
        if !request.tutor_id.is_valid() {
            return Err(BillingError::Validation("tutor_id is required".to_string()));
        }
        let plan = self.offered_plan(request.plan_id).await?;

        let supersedes = match self.subscriptions.find_by_tutor_id(request.tutor_id).await? {
            None => None,
            Some(existing) if existing.status.allows_resubscribe() => Some(existing.id),
            Some(_) => return Err(BillingError::AlreadySubscribed),
        };

        let now = Utc::now();
        let (period_start, period_end) = request.billing_cycle.period_from(now)?;
        let order_id = OrderId::generate(request.tutor_id, plan.id, now);
        let payment = PaymentRequest::for_plan(
            order_id.clone(),
            request.tutor_id,
            &plan,
            request.billing_cycle,
        );

        let intent = self.provider.create_payment(&payment).await?;

        let created = self
            .subscriptions
            .create(CreateSubscription {
                tutor_id: request.tutor_id,
                plan_id: plan.id,
                status: SubscriptionStatus::Incomplete,
                billing_cycle: request.billing_cycle,
                current_period_start: period_start,
                current_period_end: period_end,
                payment_order_id: order_id.clone(),
                supersedes,
            })
            .await;

        let subscription = match created {
            Ok(sub) => sub,
            Err(e) => {
                warn!(
                    order_id = %order_id,
                    error = %e,
                    "Payment intent created but subscription was not persisted"
                );
                return Err(match e {
                    DbError::Conflict(_) => BillingError::AlreadySubscribed,
                    other => other.into(),
                });
            }
        };

        if let Some(old) = supersedes {
            self.record(
                old,
                EventType::Canceled,
                Some(SubscriptionStatus::PastDue),
                SubscriptionStatus::Canceled,
                format!("Superseded by subscription {}", subscription.id),
            );
        }
        self.record(
            subscription.id,
            EventType::Initiated,
            None,
            SubscriptionStatus::Incomplete,
            format!(
                "Subscription initiated with {} billing cycle",
                request.billing_cycle
            ),
        );

        metrics::counter!("subscriptions_initiated_total").increment(1);
        info!(
            subscription_id = %subscription.id,
            order_id = %order_id,
            "Subscription initiated"
        );

        Ok(Checkout {
            subscription,
            payment_order_id: order_id,
            payment_url: intent.redirect_url,
            amount_cents: payment.amount_cents,
        })
    }

    // ========================================================================
    // Confirm
    // ========================================================================

    /// Client-driven payment confirmation. Idempotent.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn confirm(&self, request: ConfirmPayment) -> Result<Subscription, BillingError> {
        let sub = self.find_by_order(&request.order_id).await?;

        let settles_something = sub.status != SubscriptionStatus::Active
            || sub.is_pending_change_order(&request.order_id);
        if self.config.verify_payment_on_confirm && settles_something {
            let paid = self
                .provider
                .validate_payment_status(&request.order_id)
                .await?;
            if !paid {
                return Err(BillingError::PaymentNotCompleted(
                    request.order_id.to_string(),
                ));
            }
        }

        let note = format!(
            "Payment confirmed with PaymentID: {}, PayerID: {}",
            request.payment_id.as_deref().unwrap_or("-"),
            request.payer_id.as_deref().unwrap_or("-"),
        );
        let (subscription, _) = self.settle(sub, &request.order_id, note, "client").await?;
        Ok(subscription)
    }

    /// Apply a successful payment for `order_id` to `sub`
    async fn settle(
        &self,
        sub: Subscription,
        order_id: &OrderId,
        note: String,
        source: &'static str,
    ) -> Result<(Subscription, Settlement), BillingError> {
        if sub.is_pending_change_order(order_id) {
            return self.apply_plan_change(sub, order_id).await;
        }

        let activated = self
            .subscriptions
            .transition_by_order_id(
                order_id,
                &SubscriptionStatus::ACTIVATABLE,
                SubscriptionStatus::Active,
            )
            .await?;

        match activated {
            Some(change) => {
                self.record_change(change, EventType::PaymentConfirmed, note);
                metrics::counter!("subscriptions_activated_total", "source" => source)
                    .increment(1);
                info!(subscription_id = %change.id, source, "Subscription activated");
                Ok((self.get(change.id).await?, Settlement::Activated))
            }
            None => {
                let current = self.get(sub.id).await?;
                match current.status {
                    SubscriptionStatus::Active => Ok((current, Settlement::AlreadyActive)),
                    from => Err(BillingError::InvalidTransition {
                        from,
                        action: "confirm payment for",
                    }),
                }
            }
        }
    }

    async fn apply_plan_change(
        &self,
        sub: Subscription,
        order_id: &OrderId,
    ) -> Result<(Subscription, Settlement), BillingError> {
        let Some(change) = sub.pending_change else {
            return Ok((sub, Settlement::AlreadyActive));
        };
        let (period_start, period_end) = change.billing_cycle.period_from(Utc::now())?;

        let applied = self
            .subscriptions
            .apply_plan_change(sub.id, order_id, period_start, period_end)
            .await?;
        let current = self.get(sub.id).await?;

        if !applied {
            // Another notification for the same order got there first
            return match current.status {
                SubscriptionStatus::Active => Ok((current, Settlement::AlreadyActive)),
                from => Err(BillingError::InvalidTransition {
                    from,
                    action: "change the plan of",
                }),
            };
        }

        self.record(
            sub.id,
            EventType::PlanChanged,
            Some(sub.status),
            SubscriptionStatus::Active,
            format!(
                "Plan changed from ID {} to ID {} with {} billing cycle. Order ID: {}",
                sub.plan.id, change.plan_id, change.billing_cycle, order_id
            ),
        );
        metrics::counter!("subscriptions_plan_changed_total").increment(1);
        info!(
            subscription_id = %sub.id,
            from_plan = %sub.plan.id,
            to_plan = %change.plan_id,
            "Plan change applied"
        );
        Ok((current, Settlement::PlanChanged))
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    /// Cancel a subscription. Unpaid and trial subscriptions end now; paid
    /// ones are flagged to end with the current period.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: SubscriptionId) -> Result<Subscription, BillingError> {
        let mut sub = self.get(id).await?;

        if sub.status.cancels_immediately() {
            let canceled = self
                .subscriptions
                .transition(
                    id,
                    &SubscriptionStatus::IMMEDIATELY_CANCELABLE,
                    SubscriptionStatus::Canceled,
                )
                .await?;
            if let Some(change) = canceled {
                self.record_change(
                    change,
                    EventType::Canceled,
                    "Subscription canceled immediately".to_string(),
                );
                metrics::counter!("subscriptions_canceled_total", "mode" => "immediate")
                    .increment(1);
                info!("Subscription canceled immediately");
                return self.get(id).await;
            }
            // Status moved under us, decide again on the fresh row
            sub = self.get(id).await?;
        }

        match sub.status {
            SubscriptionStatus::Active | SubscriptionStatus::PastDue => {
                if self.subscriptions.set_cancel_at_period_end(id, true).await? {
                    self.record(
                        id,
                        EventType::CancelScheduled,
                        Some(sub.status),
                        sub.status,
                        format!(
                            "Subscription will be canceled at the end of the current period ({})",
                            sub.current_period_end.format("%Y-%m-%d")
                        ),
                    );
                    metrics::counter!("subscriptions_canceled_total", "mode" => "period_end")
                        .increment(1);
                    info!(period_end = %sub.current_period_end, "Cancellation scheduled");
                }
                self.get(id).await
            }
            SubscriptionStatus::Canceled => Err(BillingError::InvalidTransition {
                from: SubscriptionStatus::Canceled,
                action: "cancel",
            }),
            SubscriptionStatus::Incomplete | SubscriptionStatus::Trialing => Err(
                BillingError::Conflict("subscription changed concurrently, retry".to_string()),
            ),
        }
    }

    // ========================================================================
    // Change plan
    // ========================================================================

    /// Stage a plan change on an active subscription. The plan, cycle and
    /// period switch over when the returned order is paid.
    #[instrument(skip(self), fields(new_plan_id = %request.new_plan_id))]
    pub async fn change_plan(
        &self,
        id: SubscriptionId,
        request: ChangePlan,
    ) -> Result<Checkout, BillingError> {
        let plan = self.offered_plan(request.new_plan_id).await?;
        let sub = self.get(id).await?;

        if sub.status != SubscriptionStatus::Active {
            return Err(BillingError::InvalidTransition {
                from: sub.status,
                action: "change the plan of",
            });
        }
        if sub.plan.id == plan.id && sub.billing_cycle == request.billing_cycle {
            return Err(BillingError::Validation(
                "subscription is already on this plan and billing cycle".to_string(),
            ));
        }

        let order_id = OrderId::generate(sub.tutor_id, plan.id, Utc::now());
        let payment =
            PaymentRequest::for_plan(order_id.clone(), sub.tutor_id, &plan, request.billing_cycle);
        let intent = self.provider.create_payment(&payment).await?;

        let staged = self
            .subscriptions
            .stage_plan_change(
                id,
                &order_id,
                PendingPlanChange {
                    plan_id: plan.id,
                    billing_cycle: request.billing_cycle,
                },
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(c) => BillingError::Conflict(c),
                other => other.into(),
            })?;

        if !staged {
            warn!(order_id = %order_id, "Payment intent created but plan change was not staged");
            let current = self.get(id).await?;
            return Err(BillingError::InvalidTransition {
                from: current.status,
                action: "change the plan of",
            });
        }

        self.record(
            id,
            EventType::PlanChangeInitiated,
            Some(SubscriptionStatus::Active),
            SubscriptionStatus::Active,
            format!(
                "Plan change initiated from ID {} to ID {} with {} billing cycle. Order ID: {}",
                sub.plan.id, plan.id, request.billing_cycle, order_id
            ),
        );
        info!(order_id = %order_id, "Plan change staged");

        Ok(Checkout {
            subscription: self.get(id).await?,
            payment_order_id: order_id,
            payment_url: intent.redirect_url,
            amount_cents: payment.amount_cents,
        })
    }

    // ========================================================================
    // Admin override
    // ========================================================================

    /// Set any status directly
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Subscription, BillingError> {
        let change = self
            .subscriptions
            .update_status(id, status)
            .await
            .map_err(|e| match e {
                DbError::NotFound => BillingError::SubscriptionNotFound,
                DbError::Conflict(_) => BillingError::AlreadySubscribed,
                other => other.into(),
            })?;

        self.record_change(
            change,
            EventType::StatusChanged,
            format!(
                "Status manually changed from {} to {}",
                change.previous, change.current
            ),
        );
        info!(previous = %change.previous, current = %change.current, "Status overridden");
        self.get(id).await
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Apply a payment service notification
    #[instrument(skip(self, payload), fields(event = %payload.event, order_id = %payload.order_id))]
    pub async fn process_webhook(
        &self,
        payload: &PaymentWebhookPayload,
    ) -> Result<WebhookOutcome, BillingError> {
        let kind = WebhookEventKind::from(payload.event.as_str());
        if let WebhookEventKind::Unknown(event) = &kind {
            info!(event = %event, "Ignoring unhandled webhook event");
            return Ok(WebhookOutcome::Ignored("unhandled event"));
        }

        let order_id = OrderId::parse(&payload.order_id)?;
        let outcome = match kind {
            WebhookEventKind::PaymentCompleted => {
                let sub = self.find_by_order(&order_id).await?;
                let note = format!(
                    "Payment confirmed by payment service ({}, status {})",
                    payload.event,
                    payload.status.as_deref().unwrap_or("unknown")
                );
                let (sub, settlement) = self.settle(sub, &order_id, note, "webhook").await?;
                match settlement {
                    Settlement::Activated => WebhookOutcome::Activated(sub.id),
                    Settlement::AlreadyActive => WebhookOutcome::AlreadyActive(sub.id),
                    Settlement::PlanChanged => WebhookOutcome::PlanChanged(sub.id),
                }
            }
            WebhookEventKind::PaymentFailed => {
                self.payment_not_taken(
                    &order_id,
                    SubscriptionStatus::PastDue,
                    EventType::PaymentFailed,
                    "Payment failed, subscription marked as past due",
                    "Payment failed for plan change, staged change discarded",
                )
                .await?
            }
            WebhookEventKind::PaymentCanceled => {
                self.payment_not_taken(
                    &order_id,
                    SubscriptionStatus::Canceled,
                    EventType::PaymentCanceled,
                    "Payment canceled, subscription canceled",
                    "Payment canceled for plan change, staged change discarded",
                )
                .await?
            }
            WebhookEventKind::Unknown(_) => WebhookOutcome::Ignored("unhandled event"),
        };

        info!(outcome = outcome.label(), "Webhook processed");
        Ok(outcome)
    }

    /// Failed or canceled payment: an unpaid subscription moves to `to`, a
    /// staged plan change is dropped, anything else is left alone.
    async fn payment_not_taken(
        &self,
        order_id: &OrderId,
        to: SubscriptionStatus,
        event_type: EventType,
        note: &str,
        plan_change_note: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let moved = self
            .subscriptions
            .transition_by_order_id(order_id, &[SubscriptionStatus::Incomplete], to)
            .await?;
        if let Some(change) = moved {
            self.record_change(change, event_type, note.to_string());
            return Ok(match to {
                SubscriptionStatus::Canceled => WebhookOutcome::Canceled(change.id),
                _ => WebhookOutcome::MarkedPastDue(change.id),
            });
        }

        if let Some(id) = self.subscriptions.discard_plan_change(order_id).await? {
            let sub = self.get(id).await?;
            self.record(
                id,
                event_type,
                Some(sub.status),
                sub.status,
                format!("{plan_change_note}. Order ID: {order_id}"),
            );
            return Ok(WebhookOutcome::PlanChangeDiscarded(id));
        }

        // Known order in a status this notification does not affect
        self.find_by_order(order_id).await?;
        Ok(WebhookOutcome::Ignored("no applicable transition"))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn offered_plan(&self, id: PlanId) -> Result<SubscriptionPlan, BillingError> {
        self.plans
            .find_by_id(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(BillingError::PlanNotFound(id))
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(order_id.to_string()))
    }

    fn record(
        &self,
        id: SubscriptionId,
        event_type: EventType,
        previous: Option<SubscriptionStatus>,
        current: SubscriptionStatus,
        notes: String,
    ) {
        self.recorder.record(NewSubscriptionEvent::new(
            id, event_type, previous, current, notes,
        ));
    }

    fn record_change(&self, change: StatusChange, event_type: EventType, notes: String) {
        self.record(
            change.id,
            event_type,
            Some(change.previous),
            change.current,
            notes,
        );
    }
}
