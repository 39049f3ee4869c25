//! Administrative subscription handlers

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tutorhub_billing_core::{BillingError, MAX_EXPIRING_DAYS};
use tutorhub_types::{
    PageRequest, PlanId, SubscriptionEvent, SubscriptionFilter, SubscriptionId, TutorId,
    DEFAULT_PAGE_SIZE,
};

use super::shared::{
    end_of_day_exclusive, parse_date, parse_query_number, parse_status, record_op_duration,
    require_id, start_of_day, ApiJson, ApiPath, ApiQuery, DataResponse, ListResponse,
};
use super::subscriptions::SubscriptionResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default look-ahead for the expiring listing
const DEFAULT_EXPIRING_DAYS: u32 = 7;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Raw list filters; every field is parsed by hand for precise 400s
#[derive(Debug, Default, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub status: Option<String>,
    pub tutor_id: Option<String>,
    pub plan_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListSubscriptionsQuery {
    fn filter(&self) -> Result<SubscriptionFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_status(s)?),
        };
        let tutor_id = parse_query_number::<i64>(self.tutor_id.as_deref(), "tutor_id")?
            .map(|id| require_id(id, "tutor").map(TutorId))
            .transpose()?;
        let plan_id = parse_query_number::<i64>(self.plan_id.as_deref(), "plan_id")?
            .map(|id| require_id(id, "plan").map(PlanId))
            .transpose()?;
        let from = parse_date(self.from_date.as_deref(), "from_date")?;
        let to = parse_date(self.to_date.as_deref(), "to_date")?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ApiError::BadRequest(
                    "from_date must not be after to_date".into(),
                ));
            }
        }

        Ok(SubscriptionFilter {
            status,
            tutor_id,
            plan_id,
            created_from: from.map(start_of_day),
            created_before: to.map(end_of_day_exclusive).transpose()?,
        })
    }

    fn page(&self) -> Result<PageRequest, ApiError> {
        let page = parse_query_number::<u32>(self.page.as_deref(), "page")?.unwrap_or(1);
        let limit =
            parse_query_number::<u32>(self.limit.as_deref(), "limit")?.unwrap_or(DEFAULT_PAGE_SIZE);
        PageRequest::new(page, limit).map_err(|e| ApiError::from(BillingError::from(e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: i64,
    pub subscription_id: i64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    pub current_status: String,
    pub notes: String,
    pub created_at: String,
}

impl From<SubscriptionEvent> for EventResponse {
    fn from(event: SubscriptionEvent) -> Self {
        Self {
            id: event.id,
            subscription_id: event.subscription_id.0,
            event_type: event.event_type.to_string(),
            previous_status: event.previous_status.map(|s| s.to_string()),
            current_status: event.current_status.to_string(),
            notes: event.notes,
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListSubscriptionsQuery>,
) -> ApiResult<Json<ListResponse<SubscriptionResponse>>> {
    let filter = query.filter()?;
    let page = query.page()?;

    let result = state.subscriptions.list(&filter, page).await?;
    let result = result.map(SubscriptionResponse::from);

    Ok(Json(ListResponse {
        data: result.items,
        pagination: result.pagination,
    }))
}

/// PUT /api/admin/subscriptions/{id}/status
pub async fn update_subscription_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Json<DataResponse<SubscriptionResponse>>> {
    let start = Instant::now();
    let id = SubscriptionId(require_id(id, "subscription")?);
    if req.status.trim().is_empty() {
        return Err(ApiError::BadRequest("Status is required".into()));
    }
    let status = parse_status(&req.status)?;

    let result = state.subscriptions.set_status(id, status).await;
    record_op_duration("set_status", start, result.is_ok());
    let sub = result?;

    tracing::info!(subscription_id = %id, status = %status, "Subscription status set by admin");

    Ok(Json(DataResponse::with_message(
        sub.into(),
        "Subscription status updated successfully",
    )))
}

/// GET /api/admin/subscriptions/expiring?days=N
pub async fn expiring_subscriptions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExpiringQuery>,
) -> ApiResult<Json<DataResponse<Vec<SubscriptionResponse>>>> {
    let days = parse_query_number::<u32>(query.days.as_deref(), "days")?
        .unwrap_or(DEFAULT_EXPIRING_DAYS);
    if days == 0 || days > MAX_EXPIRING_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_EXPIRING_DAYS}"
        )));
    }

    let subs = state.subscriptions.expiring_soon(days).await?;
    Ok(Json(DataResponse::new(
        subs.into_iter().map(SubscriptionResponse::from).collect(),
    )))
}

/// GET /api/admin/subscriptions/{id}/events
pub async fn subscription_events(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DataResponse<Vec<EventResponse>>>> {
    let id = SubscriptionId(require_id(id, "subscription")?);
    let events = state.subscriptions.events(id).await?;
    Ok(Json(DataResponse::new(
        events.into_iter().map(EventResponse::from).collect(),
    )))
}
