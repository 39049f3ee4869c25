//! Integration tests for the subscription lifecycle
//!
//! These tests drive SubscriptionService against the in-memory store and a
//! mock payment service, covering initiation, confirmation, cancellation,
//! plan changes and the admin override.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{test_config, Harness};
use tutorhub_billing_core::{BillingError, ChangePlan, ConfirmPayment, InitiateSubscription};
use tutorhub_db::{PlanRepository, SubscriptionRepository};
use tutorhub_types::{
    BillingCycle, EventType, OrderId, PageRequest, PlanDraft, PlanId, SubscriptionFilter,
    SubscriptionId, SubscriptionStatus, TutorId,
};

fn confirm_request(order_id: &OrderId) -> ConfirmPayment {
    ConfirmPayment {
        order_id: order_id.clone(),
        payment_id: Some("PAY-1".to_string()),
        payer_id: Some("PAYER-1".to_string()),
    }
}

// ============================================================================
// Initiate
// ============================================================================

#[tokio::test]
async fn test_initiate_creates_incomplete_subscription() {
    let h = Harness::new().await;

    let checkout = h.initiate(7, PlanId(2), BillingCycle::Monthly).await;
    let sub = &checkout.subscription;

    assert_eq!(sub.status, SubscriptionStatus::Incomplete);
    assert_eq!(sub.tutor_id, TutorId(7));
    assert_eq!(sub.plan.name, "Premium");
    assert!(!sub.cancel_at_period_end);
    assert_eq!(checkout.amount_cents, 2_999);
    assert!(!checkout.payment_url.is_empty());
    assert!(checkout.payment_order_id.as_str().starts_with("SUB-7-2-"));
    assert_eq!(sub.payment_order_id.as_ref(), Some(&checkout.payment_order_id));

    let days = (sub.current_period_end - sub.current_period_start).num_days();
    assert!((28..=31).contains(&days), "monthly period was {days} days");

    let request = h.provider.request_for(&checkout.payment_order_id).unwrap();
    assert_eq!(request.amount(), "29.99");
    assert_eq!(request.description, "Subscription payment - Premium plan (monthly)");

    let events = h.events(sub.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Initiated);
    assert_eq!(events[0].previous_status, None);
    assert_eq!(events[0].current_status, SubscriptionStatus::Incomplete);
    assert_eq!(events[0].notes, "Subscription initiated with monthly billing cycle");
}

#[tokio::test]
async fn test_initiate_annual_charges_annual_price() {
    let h = Harness::new().await;

    let checkout = h.initiate(7, h.professional.id, BillingCycle::Annually).await;

    assert_eq!(checkout.amount_cents, 49_990);
    let sub = &checkout.subscription;
    let days = (sub.current_period_end - sub.current_period_start).num_days();
    assert!((365..=366).contains(&days), "annual period was {days} days");
}

#[tokio::test]
async fn test_second_initiate_is_rejected_while_open() {
    let h = Harness::new().await;
    h.initiate(7, PlanId(2), BillingCycle::Monthly).await;

    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(7),
            plan_id: h.basic.id,
            billing_cycle: BillingCycle::Monthly,
        })
        .await;
    assert!(matches!(result, Err(BillingError::AlreadySubscribed)));

    // Still rejected once the first one is paid
    let first = h.service.get_for_tutor(TutorId(7)).await.unwrap();
    h.service
        .set_status(first.id, SubscriptionStatus::Active)
        .await
        .unwrap();
    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(7),
            plan_id: h.basic.id,
            billing_cycle: BillingCycle::Annually,
        })
        .await;
    assert!(matches!(result, Err(BillingError::AlreadySubscribed)));
}

#[tokio::test]
async fn test_past_due_subscription_is_superseded() {
    let h = Harness::new().await;
    let first = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;
    h.service
        .set_status(first.id, SubscriptionStatus::PastDue)
        .await
        .unwrap();

    let second = h
        .initiate(7, h.professional.id, BillingCycle::Monthly)
        .await
        .subscription;

    assert_ne!(second.id, first.id);
    let old = h.service.get(first.id).await.unwrap();
    assert_eq!(old.status, SubscriptionStatus::Canceled);
    let current = h.service.get_for_tutor(TutorId(7)).await.unwrap();
    assert_eq!(current.id, second.id);

    let old_events = h.events(first.id).await;
    let last = old_events.last().unwrap();
    assert_eq!(last.event_type, EventType::Canceled);
    assert_eq!(last.previous_status, Some(SubscriptionStatus::PastDue));
    assert_eq!(last.notes, format!("Superseded by subscription {}", second.id));
}

#[tokio::test]
async fn test_canceled_subscription_allows_new_one() {
    let h = Harness::new().await;
    let first = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;
    h.service.cancel(first.id).await.unwrap();

    let second = h.initiate(7, h.basic.id, BillingCycle::Monthly).await.subscription;

    assert_eq!(second.status, SubscriptionStatus::Incomplete);
    assert_eq!(
        h.service.get(first.id).await.unwrap().status,
        SubscriptionStatus::Canceled
    );
}

#[tokio::test]
async fn test_initiate_rejects_unknown_and_inactive_plans() {
    let h = Harness::new().await;

    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(7),
            plan_id: PlanId(99),
            billing_cycle: BillingCycle::Monthly,
        })
        .await;
    assert!(matches!(result, Err(BillingError::PlanNotFound(PlanId(99)))));

    let retired = PlanDraft {
        name: "Legacy".to_string(),
        description: String::new(),
        price_monthly_cents: 500,
        price_annually_cents: 5_000,
        max_courses: 1,
        commission_rate: 20.0,
        features: vec![],
        is_active: false,
    };
    let retired = PlanRepository::create(&h.store, &retired).await.unwrap();
    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(7),
            plan_id: retired.id,
            billing_cycle: BillingCycle::Monthly,
        })
        .await;
    assert!(matches!(result, Err(BillingError::PlanNotFound(_))));
    assert_eq!(h.provider.intents_created(), 0);
}

#[tokio::test]
async fn test_initiate_rejects_missing_tutor() {
    let h = Harness::new().await;

    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(0),
            plan_id: PlanId(2),
            billing_cycle: BillingCycle::Monthly,
        })
        .await;

    assert!(matches!(result, Err(BillingError::Validation(_))));
}

#[tokio::test]
async fn test_provider_failure_persists_nothing() {
    let h = Harness::new().await;
    h.provider.set_unavailable(true);

    let result = h
        .service
        .initiate(InitiateSubscription {
            tutor_id: TutorId(7),
            plan_id: PlanId(2),
            billing_cycle: BillingCycle::Monthly,
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_provider_error(), "unexpected error: {err:?}");
    assert!(matches!(
        h.service.get_for_tutor(TutorId(7)).await,
        Err(BillingError::SubscriptionNotFound)
    ));
    let page = h
        .service
        .list(&SubscriptionFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 0);
}

// ============================================================================
// Confirm
// ============================================================================

#[tokio::test]
async fn test_confirm_activates_exactly_once() {
    let h = Harness::new().await;
    let checkout = h.initiate(7, PlanId(2), BillingCycle::Monthly).await;
    h.provider.complete(&checkout.payment_order_id);

    let first = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await
        .unwrap();
    let again = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await
        .unwrap();

    assert_eq!(first.status, SubscriptionStatus::Active);
    assert_eq!(again.status, SubscriptionStatus::Active);
    assert_eq!(again.id, first.id);

    let events = h.events(first.id).await;
    let confirmed: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::PaymentConfirmed)
        .collect();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].previous_status, Some(SubscriptionStatus::Incomplete));
    assert_eq!(confirmed[0].current_status, SubscriptionStatus::Active);
    assert_eq!(
        confirmed[0].notes,
        "Payment confirmed with PaymentID: PAY-1, PayerID: PAYER-1"
    );
}

#[tokio::test]
async fn test_confirm_requires_completed_payment() {
    let h = Harness::new().await;
    let checkout = h.initiate(7, PlanId(2), BillingCycle::Monthly).await;

    let result = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await;

    assert!(matches!(result, Err(BillingError::PaymentNotCompleted(_))));
    let sub = h.service.get(checkout.subscription.id).await.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Incomplete);
}

#[tokio::test]
async fn test_confirm_without_verification_trusts_client() {
    let h = Harness::with_config(test_config().with_payment_verification(false)).await;
    let checkout = h.initiate(7, PlanId(2), BillingCycle::Monthly).await;

    let sub = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await
        .unwrap();

    assert_eq!(sub.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn test_confirm_unknown_order() {
    let h = Harness::new().await;

    let result = h
        .service
        .confirm(confirm_request(&OrderId::parse("SUB-1-1-1").unwrap()))
        .await;

    assert!(matches!(result, Err(BillingError::OrderNotFound(_))));
}

#[tokio::test]
async fn test_confirm_canceled_subscription_is_rejected() {
    let h = Harness::with_config(test_config().with_payment_verification(false)).await;
    let checkout = h.initiate(7, PlanId(2), BillingCycle::Monthly).await;
    h.service.cancel(checkout.subscription.id).await.unwrap();

    let result = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await;

    assert!(matches!(
        result,
        Err(BillingError::InvalidTransition {
            from: SubscriptionStatus::Canceled,
            ..
        })
    ));
}

#[tokio::test]
async fn test_event_log_failure_does_not_fail_transition() {
    let h = Harness::with_failing_event_log().await;

    let sub = h.active_subscription(7, PlanId(2)).await;
    h.service.recorder().flush().await;

    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(h.service.recorder().failed_writes(), 2);
}

// ============================================================================
// Cancel
// ============================================================================

#[tokio::test]
async fn test_cancel_active_schedules_period_end() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    let canceled = h.service.cancel(sub.id).await.unwrap();

    assert_eq!(canceled.status, SubscriptionStatus::Active);
    assert!(canceled.cancel_at_period_end);
    assert_eq!(canceled.current_period_end, sub.current_period_end);

    // Repeating the request changes nothing
    h.service.cancel(sub.id).await.unwrap();
    let events = h.events(sub.id).await;
    let scheduled: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::CancelScheduled)
        .collect();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].current_status, SubscriptionStatus::Active);
    assert!(scheduled[0]
        .notes
        .contains(&sub.current_period_end.format("%Y-%m-%d").to_string()));
}

#[tokio::test]
async fn test_cancel_past_due_schedules_period_end() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;
    h.service
        .set_status(sub.id, SubscriptionStatus::PastDue)
        .await
        .unwrap();

    let canceled = h.service.cancel(sub.id).await.unwrap();

    assert_eq!(canceled.status, SubscriptionStatus::PastDue);
    assert!(canceled.cancel_at_period_end);
    assert_eq!(canceled.current_period_end, sub.current_period_end);

    h.service.cancel(sub.id).await.unwrap();
    let events = h.events(sub.id).await;
    let scheduled: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::CancelScheduled)
        .collect();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].previous_status, Some(SubscriptionStatus::PastDue));
    assert_eq!(scheduled[0].current_status, SubscriptionStatus::PastDue);
}

#[tokio::test]
async fn test_cancel_incomplete_is_immediate() {
    let h = Harness::new().await;
    let sub = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;

    let canceled = h.service.cancel(sub.id).await.unwrap();

    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    let events = h.events(sub.id).await;
    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::Canceled);
    assert_eq!(last.previous_status, Some(SubscriptionStatus::Incomplete));
    assert_eq!(last.notes, "Subscription canceled immediately");
}

#[tokio::test]
async fn test_cancel_trialing_is_immediate() {
    let h = Harness::new().await;
    let sub = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;
    h.service
        .set_status(sub.id, SubscriptionStatus::Trialing)
        .await
        .unwrap();

    let canceled = h.service.cancel(sub.id).await.unwrap();

    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn test_cancel_canceled_is_rejected() {
    let h = Harness::new().await;
    let sub = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;
    h.service.cancel(sub.id).await.unwrap();

    let result = h.service.cancel(sub.id).await;

    assert!(matches!(
        result,
        Err(BillingError::InvalidTransition { action: "cancel", .. })
    ));
}

#[tokio::test]
async fn test_cancel_missing_subscription() {
    let h = Harness::new().await;

    let result = h.service.cancel(SubscriptionId(404)).await;

    assert!(matches!(result, Err(BillingError::SubscriptionNotFound)));
}

// ============================================================================
// Change plan
// ============================================================================

#[tokio::test]
async fn test_change_plan_applies_once_paid() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    let checkout = h
        .service
        .change_plan(
            sub.id,
            ChangePlan {
                new_plan_id: h.professional.id,
                billing_cycle: BillingCycle::Annually,
            },
        )
        .await
        .unwrap();

    // Nothing switches before the payment lands
    assert_eq!(checkout.amount_cents, 49_990);
    assert_eq!(checkout.subscription.plan.id, PlanId(2));
    assert_eq!(checkout.subscription.status, SubscriptionStatus::Active);
    let pending = checkout.subscription.pending_change.unwrap();
    assert_eq!(pending.plan_id, h.professional.id);

    h.provider.complete(&checkout.payment_order_id);
    let changed = h
        .service
        .confirm(confirm_request(&checkout.payment_order_id))
        .await
        .unwrap();

    assert_eq!(changed.plan.id, h.professional.id);
    assert_eq!(changed.billing_cycle, BillingCycle::Annually);
    assert_eq!(changed.status, SubscriptionStatus::Active);
    assert!(changed.pending_change.is_none());
    let days = (changed.current_period_end - changed.current_period_start).num_days();
    assert!((365..=366).contains(&days));

    let types = h.event_types(sub.id).await;
    assert_eq!(
        types,
        vec![
            EventType::Initiated,
            EventType::PaymentConfirmed,
            EventType::PlanChangeInitiated,
            EventType::PlanChanged,
        ]
    );
}

#[tokio::test]
async fn test_staging_change_retires_original_order() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;
    let original = sub.payment_order_id.clone().unwrap();

    let checkout = h
        .service
        .change_plan(
            sub.id,
            ChangePlan {
                new_plan_id: h.basic.id,
                billing_cycle: BillingCycle::Monthly,
            },
        )
        .await
        .unwrap();
    assert_ne!(checkout.payment_order_id, original);

    // Only the latest order is tracked, so a late confirm for the first one is unknown
    let result = h.service.confirm(confirm_request(&original)).await;
    match result {
        Err(BillingError::OrderNotFound(order)) => assert_eq!(order, original.to_string()),
        other => panic!("expected OrderNotFound, got {other:?}"),
    }

    let current = h.service.get(sub.id).await.unwrap();
    assert_eq!(current.status, SubscriptionStatus::Active);
    assert!(current.pending_change.is_some());
}

#[tokio::test]
async fn test_change_plan_requires_active_subscription() {
    let h = Harness::new().await;
    let sub = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;

    let result = h
        .service
        .change_plan(
            sub.id,
            ChangePlan {
                new_plan_id: h.professional.id,
                billing_cycle: BillingCycle::Monthly,
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(BillingError::InvalidTransition {
            from: SubscriptionStatus::Incomplete,
            ..
        })
    ));
}

#[tokio::test]
async fn test_change_plan_to_current_plan_is_rejected() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    let result = h
        .service
        .change_plan(
            sub.id,
            ChangePlan {
                new_plan_id: PlanId(2),
                billing_cycle: BillingCycle::Monthly,
            },
        )
        .await;

    assert!(matches!(result, Err(BillingError::Validation(_))));
}

#[tokio::test]
async fn test_change_plan_to_unknown_plan() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    let result = h
        .service
        .change_plan(
            sub.id,
            ChangePlan {
                new_plan_id: PlanId(42),
                billing_cycle: BillingCycle::Monthly,
            },
        )
        .await;

    assert!(matches!(result, Err(BillingError::PlanNotFound(PlanId(42)))));
}

// ============================================================================
// Admin override
// ============================================================================

#[tokio::test]
async fn test_admin_set_status_logs_event() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    let updated = h
        .service
        .set_status(sub.id, SubscriptionStatus::PastDue)
        .await
        .unwrap();

    assert_eq!(updated.status, SubscriptionStatus::PastDue);
    let events = h.events(sub.id).await;
    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::StatusChanged);
    assert_eq!(last.previous_status, Some(SubscriptionStatus::Active));
    assert_eq!(last.notes, "Status manually changed from active to past_due");
}

#[tokio::test]
async fn test_admin_set_same_status_still_logs() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;

    h.service
        .set_status(sub.id, SubscriptionStatus::Active)
        .await
        .unwrap();

    let types = h.event_types(sub.id).await;
    assert_eq!(types.last(), Some(&EventType::StatusChanged));
}

#[tokio::test]
async fn test_admin_cannot_reopen_second_subscription() {
    let h = Harness::new().await;
    let first = h.initiate(7, PlanId(2), BillingCycle::Monthly).await.subscription;
    h.service.cancel(first.id).await.unwrap();
    h.initiate(7, h.basic.id, BillingCycle::Monthly).await;

    let result = h
        .service
        .set_status(first.id, SubscriptionStatus::Active)
        .await;

    assert!(matches!(result, Err(BillingError::AlreadySubscribed)));
}

#[tokio::test]
async fn test_admin_set_status_missing_subscription() {
    let h = Harness::new().await;

    let result = h
        .service
        .set_status(SubscriptionId(404), SubscriptionStatus::Active)
        .await;

    assert!(matches!(result, Err(BillingError::SubscriptionNotFound)));
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_list_paginates_newest_first() {
    let h = Harness::new().await;
    for tutor in 1..=25 {
        h.initiate(tutor, PlanId(2), BillingCycle::Monthly).await;
    }

    let page = h
        .service
        .list(&SubscriptionFilter::default(), PageRequest::new(2, 10).unwrap())
        .await
        .unwrap();

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.pagination.total, 25);
    assert_eq!(page.pagination.page, 2);
    assert_eq!(page.pagination.page_size, 10);
    assert_eq!(page.pagination.total_pages, 3);

    let last = h
        .service
        .list(&SubscriptionFilter::default(), PageRequest::new(3, 10).unwrap())
        .await
        .unwrap();
    assert_eq!(last.items.len(), 5);
}

#[tokio::test]
async fn test_list_filters() {
    let h = Harness::new().await;
    for tutor in 1..=6 {
        let plan = if tutor % 2 == 0 { h.basic.id } else { h.premium.id };
        h.initiate(tutor, plan, BillingCycle::Monthly).await;
    }
    let paid = h.service.get_for_tutor(TutorId(1)).await.unwrap();
    h.service
        .set_status(paid.id, SubscriptionStatus::Active)
        .await
        .unwrap();
    let january = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    assert!(h.store.backdate_subscription(paid.id, january));

    let by_status = SubscriptionFilter {
        status: Some(SubscriptionStatus::Active),
        ..Default::default()
    };
    let page = h.service.list(&by_status, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].id, paid.id);

    let by_plan = SubscriptionFilter {
        plan_id: Some(h.basic.id),
        ..Default::default()
    };
    let page = h.service.list(&by_plan, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 3);

    let by_tutor = SubscriptionFilter {
        tutor_id: Some(TutorId(4)),
        ..Default::default()
    };
    let page = h.service.list(&by_tutor, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 1);

    let by_date = SubscriptionFilter {
        created_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        created_before: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        ..Default::default()
    };
    let page = h.service.list(&by_date, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].id, paid.id);
}

#[tokio::test]
async fn test_expiring_soon_window() {
    let h = Harness::new().await;
    let sub = h.active_subscription(7, PlanId(2)).await;
    // Unpaid subscriptions never show up
    h.initiate(8, PlanId(2), BillingCycle::Monthly).await;

    assert!(h.service.expiring_soon(7).await.unwrap().is_empty());

    let mut nearly_over = sub.clone();
    nearly_over.current_period_end = Utc::now() + Duration::days(3);
    SubscriptionRepository::update(&h.store, &nearly_over)
        .await
        .unwrap();

    let expiring = h.service.expiring_soon(7).await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].id, sub.id);
}

#[tokio::test]
async fn test_expiring_soon_rejects_out_of_range_days() {
    let h = Harness::new().await;

    assert!(matches!(
        h.service.expiring_soon(0).await,
        Err(BillingError::Validation(_))
    ));
    assert!(matches!(
        h.service.expiring_soon(366).await,
        Err(BillingError::Validation(_))
    ));
    assert!(h.service.expiring_soon(365).await.is_ok());
}

#[tokio::test]
async fn test_events_for_missing_subscription() {
    let h = Harness::new().await;

    let result = h.service.events(SubscriptionId(404)).await;

    assert!(matches!(result, Err(BillingError::SubscriptionNotFound)));
}
