//! Plan catalog handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tutorhub_types::{PlanDraft, PlanId, SubscriptionPlan};

use super::shared::{
    amount_to_cents, cents_to_amount, parse_query_number, require_id, ApiJson, ApiPath, ApiQuery,
    DataResponse, MessageResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListPlansQuery {
    pub active_only: Option<String>,
}

/// Plan body with decimal prices
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_monthly: f64,
    #[serde(default)]
    pub price_annually: f64,
    #[serde(default)]
    pub max_courses: i32,
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_active: Option<bool>,
}

impl PlanRequest {
    fn into_draft(self) -> Result<PlanDraft, ApiError> {
        Ok(PlanDraft {
            price_monthly_cents: amount_to_cents(self.price_monthly, "price_monthly")?,
            price_annually_cents: amount_to_cents(self.price_annually, "price_annually")?,
            name: self.name.trim().to_string(),
            description: self.description,
            max_courses: self.max_courses,
            commission_rate: self.commission_rate,
            features: self.features,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_monthly: f64,
    pub price_annually: f64,
    pub max_courses: i32,
    pub commission_rate: f64,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SubscriptionPlan> for PlanResponse {
    fn from(plan: SubscriptionPlan) -> Self {
        Self {
            id: plan.id.0,
            name: plan.name,
            description: plan.description,
            price_monthly: cents_to_amount(plan.price_monthly_cents),
            price_annually: cents_to_amount(plan.price_annually_cents),
            max_courses: plan.max_courses,
            commission_rate: plan.commission_rate,
            features: plan.features,
            is_active: plan.is_active,
            created_at: plan.created_at.to_rfc3339(),
            updated_at: plan.updated_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/plans
pub async fn list_plans(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListPlansQuery>,
) -> ApiResult<Json<DataResponse<Vec<PlanResponse>>>> {
    let active_only =
        parse_query_number::<bool>(query.active_only.as_deref(), "active_only")?.unwrap_or(true);
    let plans = state.plans.list(active_only).await?;
    Ok(Json(DataResponse::new(
        plans.into_iter().map(PlanResponse::from).collect(),
    )))
}

/// GET /api/plans/{id}
pub async fn get_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DataResponse<PlanResponse>>> {
    let id = PlanId(require_id(id, "plan")?);
    let plan = state.plans.get(id).await?;
    Ok(Json(DataResponse::new(plan.into())))
}

/// POST /api/admin/plans
pub async fn create_plan(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PlanRequest>,
) -> ApiResult<(StatusCode, Json<DataResponse<PlanResponse>>)> {
    let plan = state.plans.create(req.into_draft()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message(
            plan.into(),
            "Subscription plan created successfully",
        )),
    ))
}

/// PUT /api/admin/plans/{id}
pub async fn update_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PlanRequest>,
) -> ApiResult<Json<DataResponse<PlanResponse>>> {
    let id = PlanId(require_id(id, "plan")?);
    let plan = state.plans.update(id, req.into_draft()?).await?;
    Ok(Json(DataResponse::with_message(
        plan.into(),
        "Subscription plan updated successfully",
    )))
}

/// DELETE /api/admin/plans/{id}
pub async fn delete_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let id = PlanId(require_id(id, "plan")?);
    state.plans.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Subscription plan deleted successfully",
    }))
}
