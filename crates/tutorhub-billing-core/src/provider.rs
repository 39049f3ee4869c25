//! Payment provider abstraction

use async_trait::async_trait;
use serde::Deserialize;
use tutorhub_types::{format_amount, BillingCycle, OrderId, SubscriptionPlan, TutorId};

use crate::BillingError;

/// Payment status the payment service reports once funds are captured
pub const PAYMENT_STATUS_COMPLETED: &str = "COMPLETED";

/// Request to open a payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Correlation id, generated by the engine before the call
    pub order_id: OrderId,
    pub tutor_id: TutorId,
    pub amount_cents: i64,
    pub billing_cycle: BillingCycle,
    pub description: String,
}

impl PaymentRequest {
    /// Payment for `plan` billed per `cycle`
    pub fn for_plan(
        order_id: OrderId,
        tutor_id: TutorId,
        plan: &SubscriptionPlan,
        cycle: BillingCycle,
    ) -> Self {
        Self {
            order_id,
            tutor_id,
            amount_cents: plan.price_for(cycle),
            billing_cycle: cycle,
            description: format!("Subscription payment - {} plan ({cycle})", plan.name),
        }
    }

    /// Amount as the payment service expects it ("29.99")
    pub fn amount(&self) -> String {
        format_amount(self.amount_cents)
    }
}

/// Payment intent opened by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Provider-side payment id, when reported
    pub payment_id: Option<String>,
    /// Where the tutor completes the payment
    pub redirect_url: String,
}

/// Payment record as reported by the payment service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentInfo {
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: String,
    #[serde(rename = "paymentMethod", alias = "payment_method", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "transactionId", alias = "transaction_id", default)]
    pub transaction_id: Option<String>,
    #[serde(rename = "payerId", alias = "payer_id", default)]
    pub payer_id: Option<String>,
}

impl PaymentInfo {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case(PAYMENT_STATUS_COMPLETED)
    }
}

/// Payment provider trait
///
/// Abstracts the payment service so the engine can run against a mock.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a payment intent and return the redirect URL
    async fn create_payment(&self, request: &PaymentRequest)
        -> Result<PaymentIntent, BillingError>;

    /// Look up the payment recorded for an order id
    async fn get_payment_by_order_id(&self, order_id: &OrderId)
        -> Result<PaymentInfo, BillingError>;

    /// Whether the payment for an order id has completed
    async fn validate_payment_status(&self, order_id: &OrderId) -> Result<bool, BillingError> {
        Ok(self.get_payment_by_order_id(order_id).await?.is_completed())
    }
}
