//! Mock payment service for testing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tutorhub_billing_core::{
    BillingError, PaymentInfo, PaymentIntent, PaymentProvider, PaymentRequest,
};
use tutorhub_types::OrderId;

/// In-memory payment service
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    requests: Arc<DashMap<OrderId, PaymentRequest>>,
    statuses: Arc<DashMap<OrderId, String>>,
    unavailable: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the service were down
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Mark the payment for an order as captured
    pub fn complete(&self, order_id: &OrderId) {
        self.statuses
            .insert(order_id.clone(), "COMPLETED".to_string());
    }

    pub fn request_for(&self, order_id: &OrderId) -> Option<PaymentRequest> {
        self.requests.get(order_id).map(|r| r.value().clone())
    }

    pub fn intents_created(&self) -> usize {
        self.requests.len()
    }

    fn check_up(&self) -> Result<(), BillingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BillingError::ProviderUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentIntent, BillingError> {
        self.check_up()?;
        self.requests
            .insert(request.order_id.clone(), request.clone());
        Ok(PaymentIntent {
            payment_id: Some(format!("PAY-{}", request.order_id)),
            redirect_url: format!("https://pay.example.com/checkout/{}", request.order_id),
        })
    }

    async fn get_payment_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<PaymentInfo, BillingError> {
        self.check_up()?;
        let Some(request) = self.request_for(order_id) else {
            return Err(BillingError::ProviderError(
                "payment service returned 404 Not Found".to_string(),
            ));
        };
        let status = self
            .statuses
            .get(order_id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| "PENDING".to_string());
        Ok(PaymentInfo {
            order_id: order_id.to_string(),
            amount: Some(request.amount_cents as f64 / 100.0),
            currency: Some("USD".to_string()),
            status,
            payment_method: Some("PAYPAL".to_string()),
            transaction_id: None,
            payer_id: None,
        })
    }
}
