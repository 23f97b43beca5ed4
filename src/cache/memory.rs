//! Hot tier: in-process moka cache with per-entry TTL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::tier::{CacheTier, CachedResponse};
use crate::Result;

/// Default maximum number of entries in the hot tier.
pub const DEFAULT_HOT_MAX_ENTRIES: u64 = 10_000;

/// Expires each entry after its own `ttl_secs`; overwrites restart the clock.
struct EntryTtl;

impl Expiry<String, CachedResponse> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedResponse,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl())
    }
}

/// Capacity-bounded LRU hot tier.
///
/// Scoped to one worker: entries are lost on restart and never shared.
pub struct MemoryTier {
    cache: Cache<String, CachedResponse>,
}

impl MemoryTier {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();
        Self { cache }
    }

    /// Number of entries currently held (approximate until pending tasks run).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(DEFAULT_HOT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: CachedResponse) -> Result<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TierKind;
    use serde_json::json;

    #[tokio::test]
    async fn miss_then_hit() {
        let tier = MemoryTier::default();
        assert!(tier.get("k").await.unwrap().is_none());

        let entry = CachedResponse::new(json!({"text": "hi"}), TierKind::Hot, Duration::from_secs(60));
        tier.set("k", entry.clone()).await.unwrap();
        assert_eq!(tier.get("k").await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let tier = MemoryTier::default();
        let entry = CachedResponse::new(json!("short"), TierKind::Hot, Duration::from_secs(1));
        tier.set("k", entry).await.unwrap();
        assert!(tier.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(tier.get("k").await.unwrap().is_none());
    }
}
