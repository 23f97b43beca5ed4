//! Cached model health probing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::with_timeout;
use crate::{Result, telemetry};

/// How long a probe result is trusted.
pub const HEALTH_TTL: Duration = Duration::from_secs(60);

/// Default timeout for a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues a minimal synthetic request to a model.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `Ok(())` when the model answered. Any error means unhealthy.
    async fn probe(&self, model_id: &str) -> Result<()>;
}

/// Probe that reports every model healthy. Used when no invoker is configured.
pub struct AssumeHealthy;

#[async_trait]
impl HealthProbe for AssumeHealthy {
    async fn probe(&self, _model_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Last known health of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub model_id: String,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
}

/// Worker-local health cache in front of a [`HealthProbe`].
///
/// A false "unhealthy" reading corrects itself once the entry expires.
pub struct HealthTracker {
    probe: Arc<dyn HealthProbe>,
    statuses: Cache<String, HealthStatus>,
    timeout: Duration,
}

impl HealthTracker {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_ttl(probe, HEALTH_TTL)
    }

    pub fn with_ttl(probe: Arc<dyn HealthProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            statuses: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Bound every probe by `timeout`; a timed-out probe is unhealthy.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cached health of `model_id`, probing on a cache miss.
    pub async fn check(&self, model_id: &str) -> bool {
        if let Some(status) = self.statuses.get(model_id).await {
            return status.healthy;
        }

        let healthy = match with_timeout(self.timeout, self.probe.probe(model_id)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(model = model_id, error = %e, "health probe failed");
                false
            }
        };
        metrics::counter!(telemetry::HEALTH_CHECKS_TOTAL,
            "model" => model_id.to_owned(),
            "status" => if healthy { "healthy" } else { "unhealthy" },
        )
        .increment(1);
        self.mark(model_id, healthy).await;
        healthy
    }

    /// Record externally observed health (e.g. after an invocation failure).
    pub async fn mark(&self, model_id: &str, healthy: bool) {
        let status = HealthStatus {
            model_id: model_id.to_string(),
            healthy,
            checked_at: Utc::now(),
        };
        self.statuses.insert(model_id.to_string(), status).await;
    }

    /// Cached status without probing.
    pub async fn status(&self, model_id: &str) -> Option<HealthStatus> {
        self.statuses.get(model_id).await
    }
}
