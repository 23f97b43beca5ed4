//! Cache tier capability and the stored entry type.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Which tier an entry was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Low-latency, capacity-bounded, memory-resident.
    Hot,
    /// Higher-latency, durable, higher-capacity.
    Warm,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
        }
    }
}

/// A cached model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub payload: Value,
    pub tier: TierKind,
    pub ttl_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(payload: Value, tier: TierKind, ttl: Duration) -> Self {
        Self {
            payload,
            tier,
            ttl_secs: ttl.as_secs(),
            created_at: Utc::now(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_milliseconds() < (self.ttl_secs as i64).saturating_mul(1000)
    }
}

/// One layer of the response cache.
///
/// Implementations report backend failures as errors; the
/// [`CacheManager`](super::CacheManager) turns them into misses.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Tier name for logging/metrics.
    fn name(&self) -> &str;

    /// Fetch a fresh entry, or `None`.
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>>;

    /// Store `value`, expiring after `value.ttl_secs`. Last write wins.
    async fn set(&self, key: &str, value: CachedResponse) -> Result<()>;
}
