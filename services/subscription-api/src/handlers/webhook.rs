//! Payment service webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tutorhub_billing_core::{BillingError, WebhookEventKind};
use tutorhub_types::PaymentWebhookPayload;

use super::shared::record_op_duration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub result: &'static str,
}

/// POST /api/webhooks/payment
///
/// Always answers 200. Failures are logged and counted.
pub async fn payment_webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    let start = Instant::now();

    let payload: PaymentWebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable webhook payload");
            metrics::counter!(
                "subscription_webhooks_processed_total",
                "event" => "invalid",
                "result" => "rejected"
            )
            .increment(1);
            return Json(WebhookAck {
                received: true,
                result: "rejected",
            });
        }
    };

    let event = WebhookEventKind::from(payload.event.as_str()).label();
    let result = state.subscriptions.process_webhook(&payload).await;
    record_op_duration("process_webhook", start, result.is_ok());

    let label = match &result {
        Ok(outcome) => outcome.label(),
        Err(e) if e.is_not_found() => {
            tracing::warn!(order_id = %payload.order_id, "Webhook for unknown order");
            "unknown_order"
        }
        Err(BillingError::Validation(reason)) => {
            tracing::warn!(reason = %reason, "Invalid webhook payload");
            "rejected"
        }
        Err(e) => {
            tracing::error!(
                error = ?e,
                event = %payload.event,
                order_id = %payload.order_id,
                "Webhook processing failed"
            );
            "error"
        }
    };

    metrics::counter!(
        "subscription_webhooks_processed_total",
        "event" => event,
        "result" => label
    )
    .increment(1);

    Json(WebhookAck {
        received: true,
        result: label,
    })
}
