//! Application state for the Subscription API service.

use std::sync::Arc;

use tutorhub_billing_core::{PlanCatalog, SubscriptionService};
use tutorhub_db::DbPool;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Subscription lifecycle engine
    pub subscriptions: Arc<SubscriptionService>,
    /// Plan catalog
    pub plans: Arc<PlanCatalog>,
    /// Database pool, absent with the memory backend
    pub pool: Option<DbPool>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        subscriptions: SubscriptionService,
        plans: PlanCatalog,
        pool: Option<DbPool>,
        config: Config,
    ) -> Self {
        Self {
            subscriptions: Arc::new(subscriptions),
            plans: Arc::new(plans),
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
