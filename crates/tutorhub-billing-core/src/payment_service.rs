//! HTTP client for the payment service

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, instrument};
use tutorhub_types::OrderId;

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{PaymentInfo, PaymentIntent, PaymentProvider, PaymentRequest};

/// Header carrying the shared API key
pub const API_KEY_HEADER: &str = "API_KEY";

/// Payment service provider
#[derive(Clone)]
pub struct HttpPaymentProvider {
    client: Client,
    config: BillingConfig,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    #[serde(rename = "redirectUrl", alias = "redirect_url")]
    redirect_url: String,
    #[serde(rename = "paymentId", alias = "payment_id", default)]
    payment_id: Option<String>,
}

impl HttpPaymentProvider {
    /// Create a new payment service client
    pub fn new(config: BillingConfig) -> Result<Self, BillingError> {
        let client = Client::builder()
            .timeout(config.payment_timeout)
            .build()
            .map_err(|e| BillingError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.payment_service_url)
    }

    /// Send an authenticated request and decode the JSON answer
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BillingError> {
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Payment service request failed");
                BillingError::ProviderUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Payment service error");
            return Err(BillingError::ProviderError(format!(
                "payment service returned {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse payment service response");
            BillingError::ProviderError(format!("invalid payment service response: {e}"))
        })
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentIntent, BillingError> {
        debug!(amount = %request.amount(), "Creating payment intent");

        let call = self
            .client
            .post(self.url("/api/payment/paypal/create"))
            .query(&[
                ("amount", request.amount().as_str()),
                ("description", request.description.as_str()),
                ("orderId", request.order_id.as_str()),
            ]);

        let created: CreatePaymentResponse = self.send(call).await?;
        if created.redirect_url.trim().is_empty() {
            return Err(BillingError::ProviderError(
                "payment service returned no redirect URL".to_string(),
            ));
        }

        Ok(PaymentIntent {
            payment_id: created.payment_id,
            redirect_url: created.redirect_url,
        })
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_payment_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<PaymentInfo, BillingError> {
        let mut url = reqwest::Url::parse(&self.url("/api/payment/order"))
            .map_err(|e| BillingError::Internal(format!("invalid payment service URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BillingError::Internal("payment service URL cannot be a base".into()))?
            .push(order_id.as_str());

        self.send(self.client.get(url)).await
    }
}
