//! Access configuration: which models exist, their limits, and how each
//! use case routes between them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Selection rule consulted when a use case has no rule of its own.
pub const DEFAULT_RULE: &str = "default";

/// Model key used by [`AccessConfig::minimal_default`].
const FALLBACK_MODEL_KEY: &str = "default";
const FALLBACK_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";
const FALLBACK_MAX_TOKENS: u32 = 1024;

/// Point-in-time routing snapshot served by the configuration collaborator.
///
/// ```json
/// {
///   "version": "2024-06-01",
///   "active": true,
///   "model_endpoints": { "sonnet": { "model_id": "anthropic.claude-3-5-sonnet" } },
///   "rate_limits": { "sonnet": { "requests_per_minute": 60 } },
///   "selection_rules": { "medical_summary": { "primary": "sonnet", "fallback": "haiku" } }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub model_endpoints: HashMap<String, ModelEndpoint>,
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimit>,
    #[serde(default)]
    pub selection_rules: HashMap<String, SelectionRule>,
    /// Inactive snapshots are ignored in favour of the built-in default.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub version: String,
}

fn default_active() -> bool {
    true
}

impl AccessConfig {
    /// Hardcoded configuration served when the store is unreachable: one
    /// model, a conservative token budget, and a catch-all rule so every
    /// use case stays routable.
    pub fn minimal_default() -> Self {
        let mut model_endpoints = HashMap::new();
        model_endpoints.insert(
            FALLBACK_MODEL_KEY.to_string(),
            ModelEndpoint {
                model_id: FALLBACK_MODEL_ID.to_string(),
                max_tokens: Some(FALLBACK_MAX_TOKENS),
                ..ModelEndpoint::default()
            },
        );
        let mut selection_rules = HashMap::new();
        selection_rules.insert(
            DEFAULT_RULE.to_string(),
            SelectionRule {
                primary: FALLBACK_MODEL_KEY.to_string(),
                fallback: None,
            },
        );
        Self {
            model_endpoints,
            rate_limits: HashMap::new(),
            selection_rules,
            active: true,
            version: "builtin-default".to_string(),
        }
    }

    /// Selection rule for `use_case`, falling back to the [`DEFAULT_RULE`] entry.
    pub fn rule_for(&self, use_case: &str) -> Option<&SelectionRule> {
        self.selection_rules
            .get(use_case)
            .or_else(|| self.selection_rules.get(DEFAULT_RULE))
    }
}

/// Stored per-model overrides. Unset fields take the gateway defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub model_id: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
}

/// Per-minute ceilings for one model. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    #[serde(default)]
    pub requests_per_minute: Option<u64>,
    #[serde(default)]
    pub tokens_per_minute: Option<u64>,
}

/// Primary/fallback model keys for a use case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRule {
    pub primary: String,
    #[serde(default)]
    pub fallback: Option<String>,
}
