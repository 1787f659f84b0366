//! Trader configuration and API credentials.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraderError};

/// OKX REST base URL. Demo trading uses the same host plus a header.
pub const OKX_BASE_URL: &str = "https://www.okx.com";

/// Which OKX environment requests are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Live,
    /// Simulated trading (`x-simulated-trading: 1`)
    Demo,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Live => f.write_str("live"),
            Destination::Demo => f.write_str("demo"),
        }
    }
}

/// Configuration for the trader and its REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    /// REST base URL (overridable for testing)
    pub base_url: String,

    /// Live or demo trading
    pub destination: Destination,

    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,

    /// Wait after an actual leverage change before the next order (milliseconds)
    pub leverage_settle_delay_ms: u64,

    /// How long cached instrument precision stays valid; `None` caches forever
    pub precision_ttl_secs: Option<u64>,

    /// Consecutive metadata failures per instrument before fallbacks are logged as errors
    pub precision_failure_threshold: u32,

    /// Quantity digits used when instrument metadata is unavailable
    pub fallback_quantity_digits: u32,

    /// Price digits used when instrument metadata is unavailable
    pub fallback_price_digits: u32,

    /// Retry window for a single algo-order cancel (milliseconds)
    pub cancel_retry_max_elapsed_ms: u64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            base_url: OKX_BASE_URL.to_string(),
            destination: Destination::Live,
            http_timeout_secs: 30,
            leverage_settle_delay_ms: 500,
            precision_ttl_secs: None,
            precision_failure_threshold: 5,
            fallback_quantity_digits: 3,
            fallback_price_digits: 2,
            cancel_retry_max_elapsed_ms: 2_000,
        }
    }
}

impl TraderConfig {
    pub fn demo() -> Self {
        Self {
            destination: Destination::Demo,
            ..Self::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn leverage_settle_delay(&self) -> Duration {
        Duration::from_millis(self.leverage_settle_delay_ms)
    }

    pub fn precision_ttl(&self) -> Option<Duration> {
        self.precision_ttl_secs.map(Duration::from_secs)
    }

    pub fn cancel_retry_max_elapsed(&self) -> Duration {
        Duration::from_millis(self.cancel_retry_max_elapsed_ms)
    }
}

/// OKX API key triple.
#[derive(Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl fmt::Debug for OkxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxCredentials")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

impl OkxCredentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Create from environment variables:
    /// - OKX_API_KEY
    /// - OKX_SECRET_KEY
    /// - OKX_PASSPHRASE
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            require_env("OKX_API_KEY")?,
            require_env("OKX_SECRET_KEY")?,
            require_env("OKX_PASSPHRASE")?,
        ))
    }
}

/// Read OKX_DEMO (defaults to live trading).
pub fn destination_from_env() -> Destination {
    match std::env::var("OKX_DEMO") {
        Ok(v) if matches!(v.to_lowercase().as_str(), "1" | "true" | "yes") => Destination::Demo,
        _ => Destination::Live,
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TraderError::Config(format!("{} not set", name))),
    }
}
