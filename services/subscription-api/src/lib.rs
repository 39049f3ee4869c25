//! TutorHub Subscription API
//!
//! REST service for tutor subscription plans and the subscription lifecycle.
//!
//! ## REST Endpoints (API key required)
//!
//! - `POST /api/subscriptions` - Start a subscription, returns the payment link
//! - `POST /api/subscriptions/confirm` - Confirm a completed payment
//! - `GET /api/subscriptions/tutor/{tutor_id}` - Tutor's current subscription
//! - `GET /api/subscriptions/{id}` - Subscription by id
//! - `PUT /api/subscriptions/{id}/cancel` - Cancel
//! - `PUT /api/subscriptions/{id}/change-plan` - Stage a plan change
//! - `GET /api/plans` - Plan catalog
//! - `GET /api/plans/{id}` - Plan by id
//! - `GET /api/admin/subscriptions` - Filtered, paginated listing
//! - `GET /api/admin/subscriptions/expiring` - Active subscriptions ending soon
//! - `PUT /api/admin/subscriptions/{id}/status` - Status override
//! - `GET /api/admin/subscriptions/{id}/events` - Audit trail
//! - `POST /api/admin/plans`, `PUT /api/admin/plans/{id}`, `DELETE /api/admin/plans/{id}`
//! - `POST /api/webhooks/payment` - Payment service notifications
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use crate::config::Config;
pub use crate::state::AppState;

/// Build the HTTP router
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    let subscription_routes = Router::new()
        .route("/subscriptions", post(handlers::create_subscription))
        .route("/subscriptions/confirm", post(handlers::confirm_subscription))
        .route(
            "/subscriptions/tutor/{tutor_id}",
            get(handlers::get_tutor_subscription),
        )
        .route("/subscriptions/{id}", get(handlers::get_subscription))
        .route("/subscriptions/{id}/cancel", put(handlers::cancel_subscription))
        .route("/subscriptions/{id}/change-plan", put(handlers::change_plan));

    let plan_routes = Router::new()
        .route("/plans", get(handlers::list_plans))
        .route("/plans/{id}", get(handlers::get_plan));

    let admin_routes = Router::new()
        .route("/admin/subscriptions", get(handlers::list_subscriptions))
        .route(
            "/admin/subscriptions/expiring",
            get(handlers::expiring_subscriptions),
        )
        .route(
            "/admin/subscriptions/{id}/status",
            put(handlers::update_subscription_status),
        )
        .route(
            "/admin/subscriptions/{id}/events",
            get(handlers::subscription_events),
        )
        .route("/admin/plans", post(handlers::create_plan))
        .route(
            "/admin/plans/{id}",
            put(handlers::update_plan).delete(handlers::delete_plan),
        );

    // Raw body, acknowledged even when unparseable
    let webhook_routes = Router::new().route("/webhooks/payment", post(handlers::payment_webhook));

    let api = Router::new()
        .merge(subscription_routes)
        .merge(plan_routes)
        .merge(admin_routes)
        .merge(webhook_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    // Health routes (no timeout, no API key)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api", api)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
