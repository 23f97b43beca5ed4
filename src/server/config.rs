//! Configuration loading for heimdalld.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.heimdall/config.toml` (user)
//! 3. `/etc/heimdall/config.toml` (system)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::cache::{CachePolicies, CachePolicy, FileTier, MemoryTier};
use crate::config::{ConfigSnapshot, ConfigSource, HttpConfigSource, InMemoryConfigSource};
use crate::params::{Environment, ParameterCatalog};
use crate::{Heimdall, HeimdallBuilder, HeimdallError, Result};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Deployment environment; decides the `max_tokens` ceiling.
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub config_source: ConfigSourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Catalog entries merged over the built-in parameter catalog.
    #[serde(default)]
    pub parameters: Option<ParameterCatalog>,
    /// Per-family versions served when version history is unavailable.
    #[serde(default)]
    pub fallback_versions: HashMap<String, String>,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9750).
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9750".to_string()
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Where routing, experiment, and version data come from.
///
/// `url` selects the REST store; `path` a JSON snapshot file. With neither,
/// the daemon runs on the built-in minimal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSourceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Per-call timeout in seconds (default: 5).
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConfigSourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_source_timeout() -> u64 {
    5
}

impl ConfigSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Instantiate the configured source.
    pub fn build(&self) -> Result<Arc<dyn ConfigSource>> {
        match (&self.url, &self.path) {
            (Some(_), Some(_)) => Err(HeimdallError::Configuration(
                "config_source: set either url or path, not both".into(),
            )),
            (Some(url), None) => Ok(Arc::new(HttpConfigSource::with_timeout(
                url.as_str(),
                self.timeout(),
            )?)),
            (None, Some(path)) => Ok(Arc::new(InMemoryConfigSource::from_file(path)?)),
            (None, None) => {
                warn!("no config_source configured, serving built-in defaults");
                Ok(Arc::new(InMemoryConfigSource::new(ConfigSnapshot::default())))
            }
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Hot tier capacity (default: 10000 entries).
    #[serde(default = "default_hot_max_entries")]
    pub hot_max_entries: u64,
    /// Warm tier directory; the warm tier is disabled when unset.
    #[serde(default)]
    pub warm_dir: Option<PathBuf>,
    /// Per-tier operation timeout in seconds (default: 2).
    #[serde(default = "default_tier_timeout")]
    pub tier_timeout_secs: u64,
    /// Policies keyed by use case; the key `default` sets the fallback policy.
    /// Entries override the built-in policies one use case at a time.
    #[serde(default)]
    pub policies: HashMap<String, CachePolicy>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_max_entries: default_hot_max_entries(),
            warm_dir: None,
            tier_timeout_secs: default_tier_timeout(),
            policies: HashMap::new(),
        }
    }
}

fn default_hot_max_entries() -> u64 {
    crate::cache::memory::DEFAULT_HOT_MAX_ENTRIES
}

fn default_tier_timeout() -> u64 {
    2
}

impl CacheConfig {
    /// Built-in policies with the configured entries layered on top.
    pub fn policies(&self) -> CachePolicies {
        let mut policies = CachePolicies::default();
        for (use_case, policy) in &self.policies {
            if use_case == "default" {
                policies.default = *policy;
            } else {
                policies = policies.with(use_case.as_str(), *policy);
            }
        }
        policies
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.heimdall/config.toml`
    /// 3. `/etc/heimdall/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HeimdallError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".heimdall").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/heimdall/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HeimdallError::Configuration(
            "No config file found. Create ~/.heimdall/config.toml or /etc/heimdall/config.toml"
                .to_string(),
        ))
    }

    /// Decision plane builder reflecting this configuration.
    ///
    /// The model invoker is left unset; the embedding application supplies it.
    pub fn plane_builder(&self) -> Result<HeimdallBuilder> {
        let mut builder = Heimdall::builder()
            .config_source(self.config_source.build()?)
            .config_timeout(self.config_source.timeout())
            .environment(self.environment)
            .hot_tier(Arc::new(MemoryTier::new(self.cache.hot_max_entries)))
            .cache_policies(self.cache.policies())
            .tier_timeout(Duration::from_secs(self.cache.tier_timeout_secs))
            .fallback_versions(self.fallback_versions.clone());

        if let Some(dir) = &self.cache.warm_dir {
            builder = builder.warm_tier(Arc::new(FileTier::new(dir)));
        }
        if let Some(catalog) = &self.parameters {
            builder = builder.catalog(catalog.clone());
        }
        Ok(builder)
    }
}
