//! Builder for configuring decision plane instances

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::DecisionPlane;
use super::invoker::{InvokerProbe, ModelInvoker};
use crate::cache::{
    CachePolicies, CacheManager, CacheTier, DEFAULT_TIER_TIMEOUT, MemoryTier,
    memory::DEFAULT_HOT_MAX_ENTRIES,
};
use crate::config::http::DEFAULT_CONFIG_TIMEOUT;
use crate::config::{ConfigSource, ConfigStore};
use crate::endpoint::health::DEFAULT_PROBE_TIMEOUT;
use crate::endpoint::{AssumeHealthy, EndpointSelector, HealthProbe, HealthTracker};
use crate::params::{Environment, ParameterCatalog, ParameterSelector};
use crate::versioning::VersionManager;
use crate::{HeimdallError, Result};

/// Main entry point for creating decision plane instances.
pub struct Heimdall;

impl Heimdall {
    /// Create a new builder for configuring the decision plane.
    pub fn builder() -> HeimdallBuilder {
        HeimdallBuilder::new()
    }
}

/// Builder for configuring decision plane instances.
pub struct HeimdallBuilder {
    config_source: Option<Arc<dyn ConfigSource>>,
    hot_tier: Option<Arc<dyn CacheTier>>,
    warm_tier: Option<Arc<dyn CacheTier>>,
    invoker: Option<Arc<dyn ModelInvoker>>,
    health_probe: Option<Arc<dyn HealthProbe>>,
    environment: Environment,
    catalog: ParameterCatalog,
    cache_policies: CachePolicies,
    fallback_versions: HashMap<String, String>,
    config_timeout: Duration,
    tier_timeout: Duration,
    probe_timeout: Duration,
}

impl HeimdallBuilder {
    pub fn new() -> Self {
        Self {
            config_source: None,
            hot_tier: None,
            warm_tier: None,
            invoker: None,
            health_probe: None,
            environment: Environment::default(),
            catalog: ParameterCatalog::builtin(),
            cache_policies: CachePolicies::default(),
            fallback_versions: HashMap::new(),
            config_timeout: DEFAULT_CONFIG_TIMEOUT,
            tier_timeout: DEFAULT_TIER_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Configuration collaborator (required).
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Replace the default in-memory hot tier.
    pub fn hot_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.hot_tier = Some(tier);
        self
    }

    /// Enable a warm tier (none by default).
    pub fn warm_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.warm_tier = Some(tier);
        self
    }

    /// Model invocation collaborator. Also used for health probes unless
    /// [`health_probe`](Self::health_probe) is set.
    pub fn invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.health_probe = Some(probe);
        self
    }

    /// Deployment environment (default: development).
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Merge `catalog` over the built-in parameter catalog.
    pub fn catalog(mut self, catalog: ParameterCatalog) -> Self {
        self.catalog = self.catalog.extend(catalog);
        self
    }

    pub fn cache_policies(mut self, policies: CachePolicies) -> Self {
        self.cache_policies = policies;
        self
    }

    /// Per-family versions served when version history is unavailable.
    pub fn fallback_versions(mut self, versions: HashMap<String, String>) -> Self {
        self.fallback_versions = versions;
        self
    }

    /// Timeout for every configuration-source call (default: 5s).
    pub fn config_timeout(mut self, timeout: Duration) -> Self {
        self.config_timeout = timeout;
        self
    }

    /// Timeout for every cache-tier call (default: 2s).
    pub fn tier_timeout(mut self, timeout: Duration) -> Self {
        self.tier_timeout = timeout;
        self
    }

    /// Timeout for every health probe (default: 10s).
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Build the decision plane.
    pub fn build(self) -> Result<DecisionPlane> {
        let source = self.config_source.ok_or_else(|| {
            HeimdallError::Configuration("no configuration source configured".into())
        })?;
        let store = Arc::new(ConfigStore::new(source, self.config_timeout));

        let probe: Arc<dyn HealthProbe> = match (self.health_probe, &self.invoker) {
            (Some(probe), _) => probe,
            (None, Some(invoker)) => Arc::new(InvokerProbe::new(Arc::clone(invoker))),
            (None, None) => Arc::new(AssumeHealthy),
        };
        let health = HealthTracker::new(probe).with_timeout(self.probe_timeout);

        let hot = self
            .hot_tier
            .unwrap_or_else(|| Arc::new(MemoryTier::new(DEFAULT_HOT_MAX_ENTRIES)));
        let cache = CacheManager::new(hot, self.warm_tier, self.cache_policies)
            .with_timeout(self.tier_timeout);

        Ok(DecisionPlane {
            params: ParameterSelector::new(self.catalog, self.environment),
            versions: VersionManager::new(Arc::clone(&store))
                .with_fallback_versions(self.fallback_versions),
            endpoints: EndpointSelector::new(Arc::clone(&store), health),
            cache,
            invoker: self.invoker,
            store,
        })
    }
}

impl Default for HeimdallBuilder {
    fn default() -> Self {
        Self::new()
    }
}
