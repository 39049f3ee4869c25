//! Billing configuration

use std::time::Duration;

/// Default payment service call timeout
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Billing engine configuration
#[derive(Clone)]
pub struct BillingConfig {
    /// Base URL of the payment service
    pub payment_service_url: String,
    /// Shared API key sent to the payment service
    pub api_key: String,
    /// Timeout for each payment service call
    pub payment_timeout: Duration,
    /// Check with the payment service before honouring a client confirmation
    pub verify_payment_on_confirm: bool,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(payment_service_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            payment_service_url: payment_service_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            verify_payment_on_confirm: true,
        }
    }

    /// Set the payment service timeout
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    /// Enable or disable payment verification on client confirmation
    pub fn with_payment_verification(mut self, verify: bool) -> Self {
        self.verify_payment_on_confirm = verify;
        self
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("payment_service_url", &self.payment_service_url)
            .field("api_key", &"[REDACTED]")
            .field("payment_timeout", &self.payment_timeout)
            .field("verify_payment_on_confirm", &self.verify_payment_on_confirm)
            .finish()
    }
}
