//! Integration tests for the tiered response cache.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use heimdall::cache::{
    CacheManager, CachePolicies, CachePolicy, CacheRequest, CacheTier, CachedResponse, FileTier,
    MemoryTier, TierKind,
};
use heimdall::{HeimdallError, Result};

// ============================================================================
// Test tiers
// ============================================================================

/// Tier that fails every call.
struct BrokenTier;

#[async_trait]
impl CacheTier for BrokenTier {
    fn name(&self) -> &str {
        "broken"
    }

    async fn get(&self, _key: &str) -> Result<Option<CachedResponse>> {
        Err(HeimdallError::CacheBackend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: CachedResponse) -> Result<()> {
        Err(HeimdallError::CacheBackend("connection refused".into()))
    }
}

/// Tier that never answers in time.
struct StalledTier;

#[async_trait]
impl CacheTier for StalledTier {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn get(&self, _key: &str) -> Result<Option<CachedResponse>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: CachedResponse) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// In-memory tier that records writes.
#[derive(Default)]
struct RecordingTier {
    writes: Mutex<Vec<String>>,
    inner: Mutex<std::collections::HashMap<String, CachedResponse>>,
}

impl RecordingTier {
    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl CacheTier for RecordingTier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: CachedResponse) -> Result<()> {
        self.writes.lock().unwrap().push(key.to_string());
        self.inner.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

fn hot() -> Arc<dyn CacheTier> {
    Arc::new(MemoryTier::new(100))
}

fn summary_request() -> CacheRequest {
    CacheRequest::new("medical_summary")
        .field("model_id", "anthropic.claude-3-sonnet")
        .field("temperature", 0.2)
        .field("messages", json!([{"role": "user", "content": "Summarize the chart."}]))
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn keys_ignore_field_order() {
    let a = CacheRequest::new("general_chat")
        .field("model_id", "m")
        .field("temperature", 0.5)
        .field("prompt", "hello");
    let b = CacheRequest::new("general_chat")
        .field("prompt", "hello")
        .field("temperature", 0.5)
        .field("model_id", "m");
    assert_eq!(a.key().to_string(), b.key().to_string());
}

#[test]
fn keys_differ_by_use_case_and_content() {
    let base = CacheRequest::new("general_chat").field("prompt", "hello");
    let other_case = CacheRequest::new("medical_summary").field("prompt", "hello");
    let other_prompt = CacheRequest::new("general_chat").field("prompt", "goodbye");
    assert_ne!(base.key().to_string(), other_case.key().to_string());
    assert_ne!(base.key().digest(), other_prompt.key().digest());
}

#[test]
fn keys_do_not_embed_raw_content() {
    let secret = "patient reports chest pain radiating to the left arm";
    let key = CacheRequest::new("medical_summary")
        .field("messages", json!([{"role": "user", "content": secret}]))
        .key();
    let rendered = format!("{key} {:?}", key.components());
    assert!(!rendered.contains("chest pain"));
}

// ============================================================================
// Lookup and write-back
// ============================================================================

#[tokio::test]
async fn miss_then_hit_from_hot_tier() {
    let cache = CacheManager::new(hot(), None, CachePolicies::default());
    let request = summary_request();

    let lookup = cache.get(&request).await;
    assert!(!lookup.cached);
    assert!(lookup.response.is_none());

    cache.set(&request, json!({"summary": "stable"})).await;
    let lookup = cache.get(&request).await;
    assert!(lookup.cached);
    let entry = lookup.response.unwrap();
    assert_eq!(entry.tier, TierKind::Hot);
    assert_eq!(entry.payload["summary"], "stable");
    assert_eq!(entry.ttl_secs, 24 * 3600);
}

#[tokio::test]
async fn warm_hit_is_promoted_to_hot() {
    let dir = tempfile::tempdir().unwrap();
    let request = summary_request();

    // a different worker populated the warm tier
    let writer = CacheManager::new(
        hot(),
        Some(Arc::new(FileTier::new(dir.path()))),
        CachePolicies::default(),
    );
    writer.set(&request, json!({"summary": "from warm"})).await;

    let reader = CacheManager::new(
        hot(),
        Some(Arc::new(FileTier::new(dir.path()))),
        CachePolicies::default(),
    );
    let first = reader.get(&request).await.response.unwrap();
    assert_eq!(first.tier, TierKind::Warm);
    assert_eq!(first.payload["summary"], "from warm");

    let second = reader.get(&request).await.response.unwrap();
    assert_eq!(second.tier, TierKind::Hot);
}

#[tokio::test]
async fn debug_is_never_cached() {
    let warm = Arc::new(RecordingTier::default());
    let cache = CacheManager::new(hot(), Some(warm.clone()), CachePolicies::default());
    let request = CacheRequest::new("debug").field("prompt", "trace this");

    cache.set(&request, json!({"answer": 42})).await;
    let lookup = cache.get(&request).await;
    assert!(!lookup.cached);
    assert_eq!(warm.write_count(), 0);
}

#[tokio::test]
async fn warm_tier_written_only_for_long_ttls() {
    let warm = Arc::new(RecordingTier::default());
    let policies = CachePolicies::default()
        .with("short", CachePolicy::ttl(Duration::from_secs(600)))
        .with("exactly_an_hour", CachePolicy::ttl(Duration::from_secs(3600)));
    let cache = CacheManager::new(hot(), Some(warm.clone()), policies);

    cache
        .set(&CacheRequest::new("short").field("prompt", "a"), json!(1))
        .await;
    cache
        .set(&CacheRequest::new("exactly_an_hour").field("prompt", "b"), json!(2))
        .await;
    assert_eq!(warm.write_count(), 0);

    cache.set(&summary_request(), json!(3)).await;
    assert_eq!(warm.write_count(), 1);
}

#[tokio::test]
async fn failing_tiers_degrade_to_miss() {
    let cache = CacheManager::new(
        Arc::new(BrokenTier),
        Some(Arc::new(BrokenTier)),
        CachePolicies::default(),
    );
    let request = summary_request();

    cache.set(&request, json!({"summary": "lost"})).await;
    let lookup = cache.get(&request).await;
    assert!(!lookup.cached);
}

#[tokio::test]
async fn stalled_tier_times_out_as_miss() {
    let cache = CacheManager::new(
        hot(),
        Some(Arc::new(StalledTier)),
        CachePolicies::default(),
    )
    .with_timeout(Duration::from_millis(50));
    let request = summary_request();

    let started = std::time::Instant::now();
    cache.set(&request, json!({"summary": "hot only"})).await;
    // hot tier still answers
    assert!(cache.get(&request).await.cached);
    assert!(started.elapsed() < Duration::from_secs(5));

    let other = CacheRequest::new("medical_summary").field("prompt", "uncached");
    assert!(!cache.get(&other).await.cached);
}

#[tokio::test]
async fn find_similar_reports_no_match() {
    let cache = CacheManager::new(hot(), None, CachePolicies::default());
    let request = summary_request();
    cache.set(&request, json!("x")).await;
    assert!(cache.find_similar(&request).await.is_none());
}
