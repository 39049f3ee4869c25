//! Tutor-facing subscription handlers

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tutorhub_billing_core::{ChangePlan, Checkout, ConfirmPayment, InitiateSubscription};
use tutorhub_types::{OrderId, PlanId, Subscription, SubscriptionId, TutorId};

use super::shared::{
    cents_to_amount, parse_billing_cycle, record_op_duration, require_id, ApiJson, ApiPath,
    DataResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub tutor_id: i64,
    #[serde(default)]
    pub plan_id: i64,
    #[serde(default)]
    pub billing_cycle: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSubscriptionRequest {
    #[serde(default)]
    pub order_id: String,
    pub payment_id: Option<String>,
    pub payer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    #[serde(default)]
    pub new_plan_id: i64,
    #[serde(default)]
    pub billing_cycle: String,
}

#[derive(Debug, Serialize)]
pub struct PendingChangeResponse {
    pub plan_id: i64,
    pub billing_cycle: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub tutor_id: i64,
    pub plan_id: i64,
    pub plan_name: String,
    pub status: String,
    pub current_period_start: String,
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
    pub billing_cycle: String,
    /// Price of the current plan for the current cycle
    pub price: f64,
    pub features: Vec<String>,
    pub max_courses: i32,
    pub commission_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_change: Option<PendingChangeResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.0,
            tutor_id: sub.tutor_id.0,
            plan_id: sub.plan.id.0,
            price: cents_to_amount(sub.price_cents()),
            plan_name: sub.plan.name,
            status: sub.status.to_string(),
            current_period_start: sub.current_period_start.to_rfc3339(),
            current_period_end: sub.current_period_end.to_rfc3339(),
            cancel_at_period_end: sub.cancel_at_period_end,
            billing_cycle: sub.billing_cycle.to_string(),
            features: sub.plan.features,
            max_courses: sub.plan.max_courses,
            commission_rate: sub.plan.commission_rate,
            payment_order_id: sub.payment_order_id.map(|o| o.to_string()),
            payment_url: None,
            pending_change: sub.pending_change.map(|c| PendingChangeResponse {
                plan_id: c.plan_id.0,
                billing_cycle: c.billing_cycle.to_string(),
            }),
            created_at: sub.created_at.to_rfc3339(),
            updated_at: sub.updated_at.to_rfc3339(),
        }
    }
}

impl From<Checkout> for SubscriptionResponse {
    fn from(checkout: Checkout) -> Self {
        let mut response = Self::from(checkout.subscription);
        response.payment_order_id = Some(checkout.payment_order_id.to_string());
        response.payment_url = Some(checkout.payment_url);
        response
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<DataResponse<SubscriptionResponse>>)> {
    let start = Instant::now();

    if req.tutor_id <= 0 {
        return Err(ApiError::BadRequest("Tutor ID is required".into()));
    }
    if req.plan_id <= 0 {
        return Err(ApiError::BadRequest("Plan ID is required".into()));
    }
    let billing_cycle = parse_billing_cycle(&req.billing_cycle)?;

    let result = state
        .subscriptions
        .initiate(InitiateSubscription {
            tutor_id: TutorId(req.tutor_id),
            plan_id: PlanId(req.plan_id),
            billing_cycle,
        })
        .await;
    record_op_duration("initiate_subscription", start, result.is_ok());
    let checkout = result?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message(
            checkout.into(),
            "Subscription initiated successfully. Please complete payment to activate.",
        )),
    ))
}

/// POST /api/subscriptions/confirm
pub async fn confirm_subscription(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConfirmSubscriptionRequest>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let start = Instant::now();

    if req.order_id.trim().is_empty() {
        return Err(ApiError::BadRequest("Order ID is required".into()));
    }
    let order_id =
        OrderId::parse(&req.order_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let result = state
        .subscriptions
        .confirm(ConfirmPayment {
            order_id,
            payment_id: req.payment_id,
            payer_id: req.payer_id,
        })
        .await;
    record_op_duration("confirm_subscription", start, result.is_ok());
    let sub = result?;

    Ok(Json(DataResponse::with_message(
        sub.into(),
        "Subscription confirmed successfully",
    )))
}

/// GET /api/subscriptions/tutor/{tutor_id}
pub async fn get_tutor_subscription(
    State(state): State<AppState>,
    ApiPath(tutor_id): ApiPath<i64>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let tutor_id = TutorId(require_id(tutor_id, "tutor")?);
    let sub = state.subscriptions.get_for_tutor(tutor_id).await?;
    Ok(Json(DataResponse::new(sub.into())))
}

/// GET /api/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let id = SubscriptionId(require_id(id, "subscription")?);
    let sub = state.subscriptions.get(id).await?;
    Ok(Json(DataResponse::new(sub.into())))
}

/// PUT /api/subscriptions/{id}/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let start = Instant::now();
    let id = SubscriptionId(require_id(id, "subscription")?);

    let result = state.subscriptions.cancel(id).await;
    record_op_duration("cancel_subscription", start, result.is_ok());
    let sub = result?;

    Ok(Json(DataResponse::with_message(
        sub.into(),
        "Subscription cancellation processed successfully",
    )))
}

/// PUT /api/subscriptions/{id}/change-plan
pub async fn change_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ChangePlanRequest>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let start = Instant::now();
    let id = SubscriptionId(require_id(id, "subscription")?);

    if req.new_plan_id <= 0 {
        return Err(ApiError::BadRequest("New plan ID is required".into()));
    }
    let billing_cycle = parse_billing_cycle(&req.billing_cycle)?;

    let result = state
        .subscriptions
        .change_plan(
            id,
            ChangePlan {
                new_plan_id: PlanId(req.new_plan_id),
                billing_cycle,
            },
        )
        .await;
    record_op_duration("change_plan", start, result.is_ok());
    let checkout = result?;

    Ok(Json(DataResponse::with_message(
        checkout.into(),
        "Subscription plan change initiated. Please complete payment to activate the new plan.",
    )))
}
