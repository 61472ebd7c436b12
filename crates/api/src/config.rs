//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::RetryPolicy;
use payments::{RazorpayConfig, SettlementConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `DB_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET`: gateway credentials
/// - `RAZORPAY_TIMEOUT_SECS`: gateway request timeout (default: `10`)
/// - `RAZORPAY_WEBHOOK_SECRET`: webhook signing secret
/// - `PAYMENT_CURRENCY`: currency code (default: `"INR"`)
/// - `UPI_SIMULATION_ENABLED`: enables simulated UPI collection (default: `false`)
/// - `CHECKOUT_MAX_ATTEMPTS`: optimistic retry attempts (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub razorpay_timeout_secs: u64,
    pub webhook_secret: Option<String>,
    pub currency: String,
    pub upi_simulation_enabled: bool,
    pub max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
            razorpay_key_id: non_empty("RAZORPAY_KEY_ID"),
            razorpay_key_secret: non_empty("RAZORPAY_KEY_SECRET"),
            razorpay_timeout_secs: var("RAZORPAY_TIMEOUT_SECS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.razorpay_timeout_secs),
            webhook_secret: non_empty("RAZORPAY_WEBHOOK_SECRET"),
            currency: non_empty("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            upi_simulation_enabled: var("UPI_SIMULATION_ENABLED")
                .is_some_and(|v| matches!(v.trim(), "true" | "1")),
            max_attempts: var("CHECKOUT_MAX_ATTEMPTS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }

    /// Gateway credentials, when both halves are set.
    pub fn razorpay(&self) -> Option<RazorpayConfig> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some(RazorpayConfig {
                timeout: Duration::from_secs(self.razorpay_timeout_secs),
                ..RazorpayConfig::new(id, secret)
            }),
            _ => None,
        }
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            currency: self.currency.clone(),
            webhook_secret: self.webhook_secret.clone(),
            upi_simulation_enabled: self.upi_simulation_enabled,
            retry: self.retry_policy(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            max_connections: 10,
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_timeout_secs: 10,
            webhook_secret: None,
            currency: "INR".to_string(),
            upi_simulation_enabled: false,
            max_attempts: 5,
        }
    }
}
