//! Error types for the OKX transport and the trading core.

use thiserror::Error;

/// Failure of a single REST call against OKX.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Non-zero envelope code with no per-item data to inspect.
    #[error("OKX error {code}: {msg}")]
    Exchange { code: String, msg: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to sign request: {0}")]
    Signing(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// OKX reports a no-op leverage change only through its message text. Codes are
/// not reliable here: 59000 is also the generic "settings failed" rejection.
const LEVERAGE_UNCHANGED_MSG: &str = "leverage not change";

impl ApiError {
    /// Whether the exchange reported that the requested leverage is already in effect.
    pub fn is_leverage_unchanged(&self) -> bool {
        match self {
            ApiError::Exchange { msg, .. } => msg.to_lowercase().contains(LEVERAGE_UNCHANGED_MSG),
            ApiError::Status { body, .. } => body.to_lowercase().contains(LEVERAGE_UNCHANGED_MSG),
            _ => false,
        }
    }

    /// Transient failures worth retrying: network errors and 5xx / 429 responses.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            // 50011: rate limit, 50001/50004/50013: service busy or timed out
            ApiError::Exchange { code, .. } => {
                matches!(code.as_str(), "50001" | "50004" | "50011" | "50013")
            }
            _ => false,
        }
    }
}

/// Errors surfaced by the trading core to the strategy layer.
#[derive(Debug, Error)]
pub enum TraderError {
    /// The remote call itself failed.
    #[error("{op} failed for {symbol}: {source}")]
    Transport {
        op: &'static str,
        symbol: String,
        #[source]
        source: ApiError,
    },

    /// The call succeeded but OKX rejected the request in its payload.
    #[error("{op} rejected for {symbol}: {msg} (code: {code})")]
    Rejected {
        op: &'static str,
        symbol: String,
        code: String,
        msg: String,
    },

    #[error("{op} returned no data for {symbol}")]
    EmptyResponse { op: &'static str, symbol: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TraderError {
    pub(crate) fn transport(op: &'static str, symbol: impl Into<String>, source: ApiError) -> Self {
        TraderError::Transport {
            op,
            symbol: symbol.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TraderError::NotFound(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TraderError::Rejected { .. })
    }
}

pub type Result<T, E = TraderError> = std::result::Result<T, E>;
