//! Bounded-staleness access configuration cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use super::ConfigSource;
use crate::error::with_timeout;
use crate::telemetry;
use crate::types::AccessConfig;

/// How long a fetched access configuration is served before refetching.
pub const ACCESS_CONFIG_TTL: Duration = Duration::from_secs(300);

/// After a failed fetch, the default is served without retrying for this long.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Client for the configuration collaborator's access configuration.
///
/// Serves a cached snapshot for up to [`ACCESS_CONFIG_TTL`]. When the source
/// errors, times out, or returns an inactive snapshot, the hardcoded
/// [`AccessConfig::minimal_default`] is served instead, so the gateway stays
/// available but limited rather than failing closed.
pub struct ConfigStore {
    source: Arc<dyn ConfigSource>,
    access: Cache<(), Arc<AccessConfig>>,
    backoff: Cache<(), ()>,
    timeout: Duration,
}

impl ConfigStore {
    pub fn new(source: Arc<dyn ConfigSource>, timeout: Duration) -> Self {
        Self::with_ttl(source, timeout, ACCESS_CONFIG_TTL)
    }

    pub fn with_ttl(source: Arc<dyn ConfigSource>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            source,
            access: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            backoff: Cache::builder()
                .max_capacity(1)
                .time_to_live(FAILURE_BACKOFF)
                .build(),
            timeout,
        }
    }

    /// The underlying source, for history reads and appends.
    pub fn source(&self) -> &Arc<dyn ConfigSource> {
        &self.source
    }

    /// Per-call timeout applied to every source request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current access configuration. Never fails.
    pub async fn access_config(&self) -> Arc<AccessConfig> {
        if let Some(config) = self.access.get(&()).await {
            return config;
        }
        if self.backoff.contains_key(&()) {
            return Arc::new(AccessConfig::minimal_default());
        }

        match with_timeout(self.timeout, self.source.access_config()).await {
            Ok(config) if config.active => {
                debug!(source = self.source.name(), version = %config.version, "access configuration refreshed");
                let config = Arc::new(config);
                self.access.insert((), Arc::clone(&config)).await;
                config
            }
            Ok(config) => {
                warn!(
                    source = self.source.name(),
                    version = %config.version,
                    "access configuration is inactive, serving default"
                );
                self.fall_back().await
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    "access configuration unavailable, serving default"
                );
                self.fall_back().await
            }
        }
    }

    /// Drop the cached snapshot so the next read refetches.
    pub async fn invalidate(&self) {
        self.access.invalidate(&()).await;
        self.backoff.invalidate(&()).await;
    }

    async fn fall_back(&self) -> Arc<AccessConfig> {
        metrics::counter!(telemetry::CONFIG_FALLBACKS_TOTAL, "source" => "access_config")
            .increment(1);
        self.backoff.insert((), ()).await;
        Arc::new(AccessConfig::minimal_default())
    }
}
