//! TutorHub Billing Core - Subscription lifecycle
//!
//! The lifecycle engine for tutor subscriptions, the plan catalog, the
//! payment service client and the asynchronous audit log writer.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tutorhub_billing_core::{
//!     BillingConfig, EventRecorder, HttpPaymentProvider, InitiateSubscription,
//!     SubscriptionService,
//! };
//!
//! let config = BillingConfig::new("http://payment-service:8080", "api-key");
//! let provider = Arc::new(HttpPaymentProvider::new(config.clone())?);
//! let (recorder, _writer) = EventRecorder::spawn(events.clone());
//! let service = SubscriptionService::new(plans, subscriptions, events, provider, recorder, config);
//!
//! let checkout = service
//!     .initiate(InitiateSubscription {
//!         tutor_id: TutorId(7),
//!         plan_id: PlanId(2),
//!         billing_cycle: BillingCycle::Monthly,
//!     })
//!     .await?;
//! println!("pay at {}", checkout.payment_url);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod payment_service;
pub mod plans;
pub mod provider;
pub mod service;
pub mod webhook;

pub use config::BillingConfig;
pub use error::BillingError;
pub use events::EventRecorder;
pub use payment_service::{HttpPaymentProvider, API_KEY_HEADER};
pub use plans::PlanCatalog;
pub use provider::{PaymentInfo, PaymentIntent, PaymentProvider, PaymentRequest};
pub use service::{
    ChangePlan, Checkout, ConfirmPayment, InitiateSubscription, Settlement, SubscriptionService,
    MAX_EXPIRING_DAYS,
};
pub use webhook::{WebhookEventKind, WebhookOutcome};
