//! Common test utilities for subscription-api router tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use dashmap::DashMap;
use http_body_util::BodyExt;
use subscription_api::{build_router, AppState, Config};
use tower::ServiceExt;
use tutorhub_billing_core::{
    BillingError, EventRecorder, PaymentInfo, PaymentIntent, PaymentProvider, PaymentRequest,
    PlanCatalog, SubscriptionService,
};
use tutorhub_db::{MemoryStore, PlanRepository};
use tutorhub_types::{OrderId, PlanDraft};

pub const API_KEY: &str = "test-api-key";

/// Payment service double: every intent succeeds, payments complete on demand
#[derive(Default, Clone)]
pub struct StubPaymentService {
    amounts: Arc<DashMap<OrderId, i64>>,
    completed: Arc<DashMap<OrderId, ()>>,
}

#[allow(dead_code)]
impl StubPaymentService {
    pub fn complete(&self, order_id: &str) {
        if let Ok(order_id) = OrderId::parse(order_id) {
            self.completed.insert(order_id, ());
        }
    }

    pub fn amount_for(&self, order_id: &str) -> Option<i64> {
        let order_id = OrderId::parse(order_id).ok()?;
        self.amounts.get(&order_id).map(|a| *a.value())
    }
}

#[async_trait]
impl PaymentProvider for StubPaymentService {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentIntent, BillingError> {
        self.amounts
            .insert(request.order_id.clone(), request.amount_cents);
        Ok(PaymentIntent {
            payment_id: None,
            redirect_url: format!("https://pay.example.com/checkout/{}", request.order_id),
        })
    }

    async fn get_payment_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<PaymentInfo, BillingError> {
        if !self.amounts.contains_key(order_id) {
            return Err(BillingError::ProviderError(
                "payment service returned 404 Not Found".to_string(),
            ));
        }
        let status = if self.completed.contains_key(order_id) {
            "COMPLETED"
        } else {
            "PENDING"
        };
        Ok(PaymentInfo {
            order_id: order_id.to_string(),
            amount: None,
            currency: None,
            status: status.to_string(),
            payment_method: None,
            transaction_id: None,
            payer_id: None,
        })
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("STORE_BACKEND", "memory"),
        ("API_KEY", API_KEY),
        ("PAYMENT_SERVICE_URL", "http://payments.test"),
        ("METRICS_ENABLED", "false"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

/// Router over the in-memory store with Basic (id 1) and Premium (id 2) seeded
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub payments: StubPaymentService,
    pub service: Arc<SubscriptionService>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let config = test_config();
        let store = MemoryStore::new();
        for (name, monthly) in [("Basic", 999), ("Premium", 2_999)] {
            PlanRepository::create(
                &store,
                &PlanDraft {
                    name: name.to_string(),
                    description: String::new(),
                    price_monthly_cents: monthly,
                    price_annually_cents: monthly * 10,
                    max_courses: 10,
                    commission_rate: 10.0,
                    features: vec!["course_hosting".to_string()],
                    is_active: true,
                },
            )
            .await
            .unwrap();
        }

        let payments = StubPaymentService::default();
        let (recorder, _writer) = EventRecorder::spawn(Arc::new(store.clone()));
        let service = SubscriptionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(payments.clone()),
            recorder,
            config.billing.clone(),
        );
        let catalog = PlanCatalog::new(Arc::new(store));

        let state = AppState::new(service, catalog, None, config);
        let service = Arc::clone(&state.subscriptions);
        Self {
            router: build_router(state, None),
            payments,
            service,
        }
    }

    /// Authenticated request
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        self.send(method, uri, body, Some(API_KEY)).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        api_key: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("api_key", key);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.raw(builder.body(body).unwrap()).await
    }

    pub async fn raw(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// Initiate a monthly subscription and return its order id
    pub async fn initiate(&self, tutor: i64, plan: i64) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/subscriptions",
                Some(serde_json::json!({
                    "tutor_id": tutor,
                    "plan_id": plan,
                    "billing_cycle": "monthly"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["payment_order_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Initiate, pay and confirm; returns the subscription id
    pub async fn activate(&self, tutor: i64, plan: i64) -> i64 {
        let order_id = self.initiate(tutor, plan).await;
        self.payments.complete(&order_id);
        let (status, body) = self
            .call(
                Method::POST,
                "/api/subscriptions/confirm",
                Some(serde_json::json!({ "order_id": order_id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }
}
