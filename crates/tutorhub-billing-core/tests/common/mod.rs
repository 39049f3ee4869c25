//! Common test utilities for tutorhub-billing-core integration tests

pub mod mock_provider;

use std::sync::Arc;

use async_trait::async_trait;
use tutorhub_billing_core::{
    BillingConfig, Checkout, ConfirmPayment, EventRecorder, InitiateSubscription,
    SubscriptionService,
};
use tutorhub_db::{DbError, DbResult, EventRepository, MemoryStore, PlanRepository};
use tutorhub_types::{
    BillingCycle, EventType, NewSubscriptionEvent, PlanDraft, PlanId, Subscription,
    SubscriptionEvent, SubscriptionId, SubscriptionPlan, TutorId,
};

#[allow(unused_imports)]
pub use mock_provider::MockPaymentProvider;

/// Event log that rejects every write
#[derive(Default)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn log_event(&self, _: &NewSubscriptionEvent) -> DbResult<SubscriptionEvent> {
        Err(DbError::Decode("event log offline".to_string()))
    }

    async fn list_for_subscription(&self, _: SubscriptionId) -> DbResult<Vec<SubscriptionEvent>> {
        Ok(vec![])
    }
}

#[allow(dead_code)]
pub fn test_config() -> BillingConfig {
    BillingConfig::new("http://payments.test", "test-key")
}

fn plan_draft(name: &str, monthly_cents: i64, max_courses: i32, commission: f64) -> PlanDraft {
    PlanDraft {
        name: name.to_string(),
        description: format!("{name} tier"),
        price_monthly_cents: monthly_cents,
        price_annually_cents: monthly_cents * 10,
        max_courses,
        commission_rate: commission,
        features: vec!["course_hosting".to_string()],
        is_active: true,
    }
}

/// Engine wired to the in-memory store and a mock payment service
pub struct Harness {
    pub store: MemoryStore,
    pub provider: MockPaymentProvider,
    pub service: SubscriptionService,
    pub basic: SubscriptionPlan,
    pub premium: SubscriptionPlan,
    pub professional: SubscriptionPlan,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: BillingConfig) -> Self {
        let store = MemoryStore::new();
        Self::build(store.clone(), Arc::new(store), config).await
    }

    /// Harness whose event log rejects every write
    pub async fn with_failing_event_log() -> Self {
        Self::build(
            MemoryStore::new(),
            Arc::new(FailingEventRepository),
            test_config(),
        )
        .await
    }

    async fn build(
        store: MemoryStore,
        events: Arc<dyn EventRepository>,
        config: BillingConfig,
    ) -> Self {
        let provider = MockPaymentProvider::new();
        let (recorder, _writer) = EventRecorder::spawn(Arc::clone(&events));
        let service = SubscriptionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            events,
            Arc::new(provider.clone()),
            recorder,
            config,
        );

        // Premium is plan 2
        let basic = PlanRepository::create(&store, &plan_draft("Basic", 999, 5, 15.0))
            .await
            .unwrap();
        let premium = PlanRepository::create(&store, &plan_draft("Premium", 2_999, 20, 10.0))
            .await
            .unwrap();
        let professional =
            PlanRepository::create(&store, &plan_draft("Professional", 4_999, 100, 5.0))
                .await
                .unwrap();
        assert_eq!(premium.id, PlanId(2));

        Self {
            store,
            provider,
            service,
            basic,
            premium,
            professional,
        }
    }

    pub async fn initiate(&self, tutor: i64, plan: PlanId, cycle: BillingCycle) -> Checkout {
        self.service
            .initiate(InitiateSubscription {
                tutor_id: TutorId(tutor),
                plan_id: plan,
                billing_cycle: cycle,
            })
            .await
            .unwrap()
    }

    /// Initiate and pay a monthly subscription
    pub async fn active_subscription(&self, tutor: i64, plan: PlanId) -> Subscription {
        let checkout = self.initiate(tutor, plan, BillingCycle::Monthly).await;
        self.provider.complete(&checkout.payment_order_id);
        self.service
            .confirm(ConfirmPayment {
                order_id: checkout.payment_order_id,
                payment_id: Some("PAY-1".to_string()),
                payer_id: Some("PAYER-1".to_string()),
            })
            .await
            .unwrap()
    }

    /// Recorded events after the writer has drained
    pub async fn events(&self, id: SubscriptionId) -> Vec<SubscriptionEvent> {
        self.service.recorder().flush().await;
        self.service.events(id).await.unwrap()
    }

    pub async fn event_types(&self, id: SubscriptionId) -> Vec<EventType> {
        self.events(id)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}
