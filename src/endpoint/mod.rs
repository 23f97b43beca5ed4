//! Model selection with admission control and health-aware failover.
//!
//! For each use case the active [`AccessConfig`] names a primary and an
//! optional fallback model key. A model is available when it is under its
//! per-minute ceilings ([`RateLimiter`]) and its cached health probe passed
//! ([`HealthTracker`]). The primary wins when available, then the fallback;
//! with neither, selection fails with
//! [`HeimdallError::NoAvailableModel`].

pub mod health;
pub mod rate_limit;

pub use health::{AssumeHealthy, HealthProbe, HealthStatus, HealthTracker};
pub use rate_limit::{RateLimiter, RateWindow};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::types::{AccessConfig, ModelConfig};
use crate::{HeimdallError, Result, telemetry};

/// Which side of a selection rule was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRole {
    Primary,
    Fallback,
}

impl SelectionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Outcome of [`EndpointSelector::select_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    pub config: ModelConfig,
    pub role: SelectionRole,
}

/// Chooses the model that serves a request.
pub struct EndpointSelector {
    store: Arc<ConfigStore>,
    limiter: RateLimiter,
    health: HealthTracker,
}

impl EndpointSelector {
    pub fn new(store: Arc<ConfigStore>, health: HealthTracker) -> Self {
        Self {
            store,
            limiter: RateLimiter::new(),
            health,
        }
    }

    /// Active access configuration (cached; default on store failure).
    pub async fn get_active_config(&self) -> Arc<AccessConfig> {
        self.store.access_config().await
    }

    /// Whether `model_key` is under its configured per-minute ceilings.
    pub async fn check_rate_limit(&self, model_key: &str) -> bool {
        let config = self.get_active_config().await;
        self.rate_limit_ok(&config, model_key)
    }

    /// Count a completed call of `tokens` against `model_key`'s current window.
    pub fn update_usage(&self, model_key: &str, tokens: u64) {
        self.limiter.record(model_key, tokens);
    }

    /// Cached health of `model_key` (probes its model ID on a cache miss).
    pub async fn check_health(&self, model_key: &str) -> bool {
        let config = self.get_active_config().await;
        self.health.check(model_id_for(&config, model_key)).await
    }

    /// Record externally observed health for `model_key`.
    pub async fn mark_health(&self, model_key: &str, healthy: bool) {
        let config = self.get_active_config().await;
        self.health.mark(model_id_for(&config, model_key), healthy).await;
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Pick the primary or fallback model for `use_case`.
    ///
    /// `context` may carry a `request_id`, which is attached to the log
    /// events this selection emits.
    pub async fn select_model(
        &self,
        use_case: &str,
        context: Option<&Value>,
    ) -> Result<ModelSelection> {
        let request_id = context
            .and_then(|c| c.get("request_id"))
            .and_then(Value::as_str)
            .unwrap_or("-");
        let config = self.get_active_config().await;
        let rule = config.rule_for(use_case).ok_or_else(|| {
            HeimdallError::Configuration(format!("no selection rule for use case '{use_case}'"))
        })?;

        if self.is_available(&config, &rule.primary).await {
            debug!(use_case, request_id, model = %rule.primary, "selected primary model");
            return Ok(self.selected(&config, &rule.primary, use_case, SelectionRole::Primary));
        }

        if let Some(fallback) = &rule.fallback
            && self.is_available(&config, fallback).await
        {
            warn!(
                use_case,
                request_id,
                primary = %rule.primary,
                fallback = %fallback,
                "primary model unavailable, using fallback"
            );
            return Ok(self.selected(&config, fallback, use_case, SelectionRole::Fallback));
        }

        warn!(use_case, request_id, primary = %rule.primary, "no model available");
        Err(HeimdallError::NoAvailableModel {
            use_case: use_case.to_string(),
        })
    }

    /// Stored overrides for `model_key` merged onto the gateway defaults.
    pub async fn prepare_config(&self, model_key: &str) -> ModelConfig {
        let config = self.get_active_config().await;
        prepare_from(&config, model_key)
    }

    async fn is_available(&self, config: &AccessConfig, model_key: &str) -> bool {
        if !self.rate_limit_ok(config, model_key) {
            return false;
        }
        self.health.check(model_id_for(config, model_key)).await
    }

    fn rate_limit_ok(&self, config: &AccessConfig, model_key: &str) -> bool {
        let ok = self
            .limiter
            .check(model_key, config.rate_limits.get(model_key));
        if !ok {
            metrics::counter!(telemetry::RATE_LIMIT_REJECTIONS_TOTAL, "model" => model_key.to_owned())
                .increment(1);
        }
        ok
    }

    fn selected(
        &self,
        config: &AccessConfig,
        model_key: &str,
        use_case: &str,
        role: SelectionRole,
    ) -> ModelSelection {
        metrics::counter!(telemetry::MODEL_SELECTIONS_TOTAL,
            "model" => model_key.to_owned(),
            "use_case" => use_case.to_owned(),
            "role" => role.as_str(),
        )
        .increment(1);
        ModelSelection {
            config: prepare_from(config, model_key),
            role,
        }
    }
}

/// Provider model ID for `model_key`; unknown keys are passed through.
fn model_id_for<'a>(config: &'a AccessConfig, model_key: &'a str) -> &'a str {
    config
        .model_endpoints
        .get(model_key)
        .map(|e| e.model_id.as_str())
        .unwrap_or(model_key)
}

fn prepare_from(config: &AccessConfig, model_key: &str) -> ModelConfig {
    let Some(endpoint) = config.model_endpoints.get(model_key) else {
        warn!(model = model_key, "no endpoint configured, using defaults");
        return ModelConfig::with_defaults(model_key, model_key);
    };
    let defaults = ModelConfig::with_defaults(model_key, &endpoint.model_id);
    ModelConfig {
        max_tokens: endpoint.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: endpoint.temperature.unwrap_or(defaults.temperature),
        top_p: endpoint.top_p.unwrap_or(defaults.top_p),
        stop_sequences: endpoint
            .stop_sequences
            .clone()
            .unwrap_or(defaults.stop_sequences.clone()),
        timeout_secs: endpoint.timeout_secs.unwrap_or(defaults.timeout_secs),
        retry_attempts: endpoint.retry_attempts.unwrap_or(defaults.retry_attempts),
        ..defaults
    }
}
