//! TutorHub Subscription API server
//!
//! See the library docs for the route table.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use subscription_api::config::{LogFormat, StoreBackend};
use subscription_api::{build_router, AppState, Config};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tutorhub_billing_core::{EventRecorder, HttpPaymentProvider, PlanCatalog, SubscriptionService};
use tutorhub_db::{
    DbPool, EventRepository, MemoryStore, PlanRepository, Repositories, SubscriptionRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    tracing::info!("Starting TutorHub Subscription API");
    tracing::info!(
        http_port = config.http_port,
        store = ?config.store_backend,
        payment_service = %config.billing.payment_service_url,
        "Configuration loaded"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let Store {
        plans,
        subscriptions,
        events,
        pool,
    } = open_store(&config).await?;

    let (recorder, _writer) = EventRecorder::spawn(Arc::clone(&events));
    let provider = Arc::new(HttpPaymentProvider::new(config.billing.clone())?);

    let service = SubscriptionService::new(
        Arc::clone(&plans),
        subscriptions,
        events,
        provider,
        recorder.clone(),
        config.billing.clone(),
    );
    let catalog = PlanCatalog::new(plans);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(service, catalog, pool, config);
    let app = build_router(state, metrics_handle);

    if let Err(e) = run_http_server(app, addr).await {
        tracing::error!(error = ?e, "HTTP server error");
    }

    // Drain queued audit events before exit
    recorder.flush().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Repositories for the configured backend
struct Store {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn EventRepository>,
    pool: Option<DbPool>,
}

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres"))?;
            let pool = tutorhub_db::create_pool(url, config.db_max_connections).await?;
            tracing::info!("Database pool created");

            if config.run_migrations {
                tutorhub_db::run_migrations(&pool).await?;
                tracing::info!("Migrations applied");
            }

            let repos = Repositories::new(pool.clone());
            Ok(Store {
                plans: Arc::new(repos.plans),
                subscriptions: Arc::new(repos.subscriptions),
                events: Arc::new(repos.events),
                pool: Some(pool),
            })
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            let store = MemoryStore::new();
            Ok(Store {
                plans: Arc::new(store.clone()),
                subscriptions: Arc::new(store.clone()),
                events: Arc::new(store),
                pool: None,
            })
        }
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("subscription_api=debug".parse()?);
    let (json, text) = match format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Payment service round trips dominate; most calls finish well under 1s
    let latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("subscription_operation_duration_seconds".to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        "subscriptions_initiated_total",
        "Total subscriptions initiated"
    );
    metrics::describe_counter!(
        "subscriptions_activated_total",
        "Total subscriptions activated by confirmation source"
    );
    metrics::describe_counter!(
        "subscriptions_plan_changed_total",
        "Total paid plan changes applied"
    );
    metrics::describe_counter!(
        "subscriptions_canceled_total",
        "Total cancellations by mode"
    );
    metrics::describe_counter!(
        "subscription_webhooks_processed_total",
        "Total payment webhooks by event and result"
    );
    metrics::describe_counter!(
        "subscription_event_log_failures_total",
        "Audit events that could not be written"
    );
    metrics::describe_histogram!(
        "subscription_operation_duration_seconds",
        "Subscription operation latency in seconds by operation and result"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
