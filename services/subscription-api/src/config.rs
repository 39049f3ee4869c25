//! Configuration for the Subscription API service.

use std::time::Duration;

use tutorhub_billing_core::BillingConfig;

/// Where subscriptions are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store, for local runs and tests
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Subscription API configuration
#[derive(Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Store backend
    pub store_backend: StoreBackend,
    /// Database URL, required for the postgres backend
    pub database_url: Option<String>,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
    /// Key every API caller must present
    pub api_key: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Store
        let store_backend = match var("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };
        let database_url = var("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        let db_max_connections = parse_or(var("DB_MAX_CONNECTIONS"), 10, "DB_MAX_CONNECTIONS")?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid("DB_MAX_CONNECTIONS"));
        }
        let run_migrations = parse_bool_or(var("RUN_MIGRATIONS"), true, "RUN_MIGRATIONS")?;

        // Server
        let http_port = parse_or(
            var("HTTP_PORT").or_else(|| var("PORT")),
            8086,
            "HTTP_PORT",
        )?;
        let request_timeout_secs: u64 =
            parse_or(var("REQUEST_TIMEOUT_SECS"), 30, "REQUEST_TIMEOUT_SECS")?;

        // Auth
        let api_key = var("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;

        // Payment service
        let payment_service_url =
            var("PAYMENT_SERVICE_URL").ok_or(ConfigError::Missing("PAYMENT_SERVICE_URL"))?;
        if !payment_service_url.starts_with("http://") && !payment_service_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid("PAYMENT_SERVICE_URL"));
        }
        let payment_timeout_secs: u64 =
            parse_or(var("PAYMENT_TIMEOUT_SECS"), 10, "PAYMENT_TIMEOUT_SECS")?;
        let verify_payment_on_confirm = parse_bool_or(
            var("VERIFY_PAYMENT_ON_CONFIRM"),
            true,
            "VERIFY_PAYMENT_ON_CONFIRM",
        )?;

        // Observability
        let metrics_enabled = parse_bool_or(var("METRICS_ENABLED"), true, "METRICS_ENABLED")?;
        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let billing = BillingConfig::new(payment_service_url, api_key.clone())
            .with_payment_timeout(Duration::from_secs(payment_timeout_secs))
            .with_payment_verification(verify_payment_on_confirm);

        Ok(Self {
            http_port,
            store_backend,
            database_url,
            db_max_connections,
            run_migrations,
            api_key,
            billing,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
            log_format,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    default: T,
    key: &'static str,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool_or(value: Option<String>, default: bool, key: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("store_backend", &self.store_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_connections", &self.db_max_connections)
            .field("run_migrations", &self.run_migrations)
            .field("api_key", &"[REDACTED]")
            .field("billing", &self.billing)
            .field("request_timeout", &self.request_timeout)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
