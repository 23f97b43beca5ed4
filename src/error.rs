//! Heimdall error types

use std::time::Duration;

/// Heimdall error types
#[derive(Debug, thiserror::Error)]
pub enum HeimdallError {
    // Routing errors (surfaced to the caller)
    /// No selection rule exists for the requested use case.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Primary and fallback are both rate-limited or unhealthy.
    #[error("no available model for use case '{use_case}'")]
    NoAvailableModel { use_case: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Backend errors (recovered locally)
    #[error("cache backend error: {0}")]
    CacheBackend(String),

    #[error("upstream configuration unavailable: {0}")]
    UpstreamConfigUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Model invocation collaborator
    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl HeimdallError {
    /// Stable error name used in the `{error, message}` envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::NoAvailableModel { .. } => "NoAvailableModelError",
            Self::InvalidInput(_) => "InvalidInput",
            Self::CacheBackend(_) => "CacheBackendError",
            Self::UpstreamConfigUnavailable(_) => "UpstreamConfigUnavailable",
            Self::Http(_) => "HttpError",
            Self::Timeout(_) => "TimeoutError",
            Self::Json(_) => "JsonError",
            Self::Invocation(_) => "InvocationError",
        }
    }

    /// Whether the pipeline absorbs this error into a degraded outcome
    /// (miss, unhealthy, default config) instead of surfacing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CacheBackend(_)
                | Self::UpstreamConfigUnavailable(_)
                | Self::Http(_)
                | Self::Timeout(_)
        )
    }

    /// Whether the caller sent a request that can never be routed as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<reqwest::Error> for HeimdallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HeimdallError::Http(format!("request timed out: {err}"))
        } else if err.is_decode() {
            HeimdallError::UpstreamConfigUnavailable(format!("malformed response: {err}"))
        } else {
            HeimdallError::Http(err.to_string())
        }
    }
}

/// Result type alias for Heimdall operations
pub type Result<T> = std::result::Result<T, HeimdallError>;

/// Run `fut` under `limit`, mapping expiry to [`HeimdallError::Timeout`].
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(HeimdallError::Timeout(limit)),
    }
}
