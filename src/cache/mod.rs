//! Two-tier response cache.
//!
//! - Hot tier ([`MemoryTier`]): moka LRU in worker memory, consulted first.
//! - Warm tier ([`FileTier`] or any [`CacheTier`]): durable, shared across
//!   workers. Only entries whose TTL exceeds [`WARM_TIER_MIN_TTL`] are
//!   written there; warm hits are promoted into the hot tier.
//!
//! Entries are keyed by a [`CacheKey`] fingerprint. Tier failures and
//! timeouts are logged and become misses; they never reach the caller.
//!
//! # Near-duplicate lookup
//!
//! [`CacheManager::find_similar`] is a named extension point for
//! similarity-based matching. It always reports no match; there is no
//! embedding or distance model behind it.

pub mod file;
pub mod key;
pub mod memory;
pub mod tier;

pub use file::FileTier;
pub use key::CacheKey;
pub use memory::MemoryTier;
pub use tier::{CacheTier, CachedResponse, TierKind};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::with_timeout;
use crate::telemetry;
use crate::types::Params;

/// Only entries living longer than this are written to the warm tier.
pub const WARM_TIER_MIN_TTL: Duration = Duration::from_secs(3600);

/// Default timeout for a single tier operation.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-use-case caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ttl(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl_secs: ttl.as_secs(),
        }
    }
}

/// Cache policies keyed by use case, with a default for unlisted ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicies {
    #[serde(default)]
    pub default: CachePolicy,
    #[serde(default, flatten)]
    pub use_cases: HashMap<String, CachePolicy>,
}

impl Default for CachePolicies {
    /// Built-in policies: `debug` is never cached, medical summaries live a
    /// day, diagnoses six hours, everything else one hour.
    fn default() -> Self {
        let mut use_cases = HashMap::new();
        use_cases.insert("debug".to_string(), CachePolicy::disabled());
        use_cases.insert(
            "medical_summary".to_string(),
            CachePolicy::ttl(Duration::from_secs(24 * 3600)),
        );
        use_cases.insert(
            "medical_diagnosis".to_string(),
            CachePolicy::ttl(Duration::from_secs(6 * 3600)),
        );
        Self {
            default: CachePolicy::default(),
            use_cases,
        }
    }
}

impl CachePolicies {
    /// Policy for `use_case`.
    pub fn for_use_case(&self, use_case: &str) -> CachePolicy {
        self.use_cases
            .get(use_case)
            .copied()
            .unwrap_or(self.default)
    }

    /// Set (or replace) the policy for one use case.
    pub fn with(mut self, use_case: impl Into<String>, policy: CachePolicy) -> Self {
        self.use_cases.insert(use_case.into(), policy);
        self
    }
}

/// Cache lookup request: a use case plus its key-relevant fields.
///
/// ```json
/// { "use_case": "medical_summary", "model_id": "...", "messages": [...] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheRequest {
    pub use_case: String,
    #[serde(flatten)]
    pub fields: Params,
}

impl CacheRequest {
    pub fn new(use_case: impl Into<String>) -> Self {
        Self {
            use_case: use_case.into(),
            fields: Params::new(),
        }
    }

    /// Add a key-relevant field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.use_case, &self.fields)
    }
}

/// Outcome of a cache lookup. A miss is a successful result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheLookup {
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CachedResponse>,
}

impl CacheLookup {
    pub fn miss() -> Self {
        Self {
            cached: false,
            response: None,
        }
    }

    pub fn hit(response: CachedResponse) -> Self {
        Self {
            cached: true,
            response: Some(response),
        }
    }
}

/// Tiered cache front-end.
pub struct CacheManager {
    hot: Arc<dyn CacheTier>,
    warm: Option<Arc<dyn CacheTier>>,
    policies: CachePolicies,
    timeout: Duration,
}

impl CacheManager {
    pub fn new(
        hot: Arc<dyn CacheTier>,
        warm: Option<Arc<dyn CacheTier>>,
        policies: CachePolicies,
    ) -> Self {
        Self {
            hot,
            warm,
            policies,
            timeout: DEFAULT_TIER_TIMEOUT,
        }
    }

    /// Bound every tier operation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policies(&self) -> &CachePolicies {
        &self.policies
    }

    /// Look up a cached response: hot tier, then warm tier with promotion.
    ///
    /// Disabled use cases return a miss without computing a key.
    pub async fn get(&self, request: &CacheRequest) -> CacheLookup {
        let use_case = request.use_case.as_str();
        let policy = self.policies.for_use_case(use_case);
        if !policy.enabled {
            record_miss(use_case);
            return CacheLookup::miss();
        }

        let key = request.key().to_string();

        if let Some(entry) = self.tier_get(&self.hot, TierKind::Hot, &key).await {
            record_hit(use_case, TierKind::Hot);
            return CacheLookup::hit(entry);
        }

        if let Some(warm) = &self.warm
            && let Some(entry) = self.tier_get(warm, TierKind::Warm, &key).await
        {
            let promoted = CachedResponse::new(
                entry.payload.clone(),
                TierKind::Hot,
                Duration::from_secs(policy.ttl_secs),
            );
            self.tier_set(&self.hot, TierKind::Hot, &key, promoted).await;
            debug!(use_case, "promoted warm entry to hot tier");
            record_hit(use_case, TierKind::Warm);
            return CacheLookup::hit(CachedResponse {
                tier: TierKind::Warm,
                ..entry
            });
        }

        record_miss(use_case);
        CacheLookup::miss()
    }

    /// Store a response: always in the hot tier, and in the warm tier only
    /// when the use case's TTL exceeds [`WARM_TIER_MIN_TTL`].
    pub async fn set(&self, request: &CacheRequest, payload: Value) {
        let policy = self.policies.for_use_case(&request.use_case);
        if !policy.enabled {
            return;
        }

        let key = request.key().to_string();
        let ttl = Duration::from_secs(policy.ttl_secs);

        if ttl > WARM_TIER_MIN_TTL
            && let Some(warm) = &self.warm
        {
            let entry = CachedResponse::new(payload.clone(), TierKind::Warm, ttl);
            self.tier_set(warm, TierKind::Warm, &key, entry).await;
        }

        let entry = CachedResponse::new(payload, TierKind::Hot, ttl);
        self.tier_set(&self.hot, TierKind::Hot, &key, entry).await;
    }

    /// Near-duplicate lookup extension point. Always `None`.
    pub async fn find_similar(&self, _request: &CacheRequest) -> Option<CachedResponse> {
        None
    }

    async fn tier_get(
        &self,
        tier: &Arc<dyn CacheTier>,
        kind: TierKind,
        key: &str,
    ) -> Option<CachedResponse> {
        match with_timeout(self.timeout, tier.get(key)).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(tier = kind.as_str(), backend = tier.name(), error = %e, "cache read failed, treating as miss");
                record_error(kind, "get");
                None
            }
        }
    }

    async fn tier_set(
        &self,
        tier: &Arc<dyn CacheTier>,
        kind: TierKind,
        key: &str,
        entry: CachedResponse,
    ) {
        if let Err(e) = with_timeout(self.timeout, tier.set(key, entry)).await {
            warn!(tier = kind.as_str(), backend = tier.name(), error = %e, "cache write failed");
            record_error(kind, "set");
        }
    }
}

fn record_hit(use_case: &str, tier: TierKind) {
    metrics::counter!(telemetry::CACHE_HITS_TOTAL,
        "use_case" => use_case.to_owned(),
        "tier" => tier.as_str(),
    )
    .increment(1);
}

fn record_miss(use_case: &str) {
    metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "use_case" => use_case.to_owned())
        .increment(1);
}

fn record_error(tier: TierKind, operation: &'static str) {
    metrics::counter!(telemetry::CACHE_ERRORS_TOTAL,
        "tier" => tier.as_str(),
        "operation" => operation,
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_use_case_gets_default_policy() {
        let policies = CachePolicies::default();
        assert_eq!(policies.for_use_case("triage"), CachePolicy::default());
        assert!(!policies.for_use_case("debug").enabled);
    }

    #[test]
    fn policies_parse_flattened_use_cases() {
        let json = r#"{
            "default": { "ttl_secs": 600 },
            "debug": { "enabled": false },
            "reports": { "ttl_secs": 86400 }
        }"#;
        let policies: CachePolicies = serde_json::from_str(json).unwrap();
        assert_eq!(policies.default.ttl_secs, 600);
        assert!(!policies.for_use_case("debug").enabled);
        assert_eq!(policies.for_use_case("reports").ttl_secs, 86400);
    }

    #[test]
    fn cache_request_flattens_fields() {
        let request: CacheRequest =
            serde_json::from_str(r#"{"use_case": "triage", "prompt": "hi", "model_id": "m"}"#)
                .unwrap();
        assert_eq!(request.use_case, "triage");
        assert_eq!(request.fields.len(), 2);
    }

    #[test]
    fn miss_serializes_without_response() {
        let json = serde_json::to_value(CacheLookup::miss()).unwrap();
        assert_eq!(json, serde_json::json!({"cached": false}));
    }
}
