//! Concrete per-request model configuration.

use serde::{Deserialize, Serialize};

/// Resolved configuration for one model key. Exactly one is produced per
/// request by [`EndpointSelector::select_model`](crate::endpoint::EndpointSelector::select_model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Key the access configuration uses for this model (e.g. "claude-sonnet").
    pub model_key: String,
    /// Provider-side model identifier.
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Invocation timeout in seconds.
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl ModelConfig {
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_TOP_P: f64 = 1.0;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

    /// Configuration with gateway defaults and no stored overrides.
    pub fn with_defaults(model_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            model_id: model_id.into(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
            top_p: Self::DEFAULT_TOP_P,
            stop_sequences: Vec::new(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            retry_attempts: Self::DEFAULT_RETRY_ATTEMPTS,
        }
    }
}
