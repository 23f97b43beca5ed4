//! Concrete model version resolution.
//!
//! Resolution order for a family and channel:
//!
//! 1. An active A/B test for the family that buckets the caller into its
//!    test arm wins immediately.
//! 2. Otherwise the latest history record on the channel, cached for five
//!    minutes per `(family, channel)`.
//! 3. With no record (or an unreachable store), a synthetic fallback version.
//!
//! Identified callers are bucketed deterministically (`hash(user_id) % 100`);
//! anonymous callers draw a fresh random bucket on every call.

pub mod ab;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::config::store::FAILURE_BACKOFF;
use crate::error::with_timeout;
use crate::types::{AbTest, Arm, STABLE_CHANNEL, VersionRecord, VersionSource};
use crate::{HeimdallError, Result, telemetry};

/// How long experiments and channel lookups are cached.
pub const VERSION_CACHE_TTL: Duration = Duration::from_secs(300);

/// A concrete version and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    pub version_id: String,
    pub source: VersionSource,
}

/// Resolves versions and writes version history.
pub struct VersionManager {
    store: Arc<ConfigStore>,
    ab_tests: Cache<(), Arc<Vec<AbTest>>>,
    channels: Cache<(String, String), ResolvedVersion>,
    ab_backoff: Cache<(), ()>,
    channel_backoff: Cache<(String, String), ()>,
    fallback_versions: HashMap<String, String>,
}

impl VersionManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self::with_ttl(store, VERSION_CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            ab_tests: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            channels: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),
            ab_backoff: Cache::builder()
                .max_capacity(1)
                .time_to_live(FAILURE_BACKOFF)
                .build(),
            channel_backoff: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(FAILURE_BACKOFF)
                .build(),
            fallback_versions: HashMap::new(),
        }
    }

    /// Versions served per family when history is unavailable. Families
    /// without an entry fall back to `"{family}-default"`.
    pub fn with_fallback_versions(mut self, versions: HashMap<String, String>) -> Self {
        self.fallback_versions = versions;
        self
    }

    /// Active experiments. An unreachable source means "no active tests",
    /// and the source is not asked again until [`FAILURE_BACKOFF`] elapses.
    pub async fn load_ab_config(&self) -> Arc<Vec<AbTest>> {
        if let Some(tests) = self.ab_tests.get(&()).await {
            return tests;
        }
        if self.ab_backoff.contains_key(&()) {
            return Arc::new(Vec::new());
        }
        let source = self.store.source();
        match with_timeout(self.store.timeout(), source.ab_tests()).await {
            Ok(tests) => {
                let active: Vec<AbTest> = tests
                    .into_iter()
                    .filter(|t| t.status == crate::types::AbTestStatus::Active)
                    .collect();
                debug!(active = active.len(), "loaded experiment definitions");
                let active = Arc::new(active);
                self.ab_tests.insert((), Arc::clone(&active)).await;
                active
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "experiments unavailable, assuming none active");
                metrics::counter!(telemetry::CONFIG_FALLBACKS_TOTAL, "source" => "ab_tests")
                    .increment(1);
                self.ab_backoff.insert((), ()).await;
                Arc::new(Vec::new())
            }
        }
    }

    /// Test-arm version for `family`, if the caller lands in a test arm.
    ///
    /// Returns the first matching test's version; control-arm assignments
    /// fall through to the next test, then to channel resolution.
    pub async fn check_ab_test(&self, family: &str, user_id: Option<&str>) -> Option<ResolvedVersion> {
        let tests = self.load_ab_config().await;
        for test in tests.iter().filter(|t| t.applies_to(family)) {
            let arm = ab::assign(test, ab::bucket_for(user_id));
            metrics::counter!(telemetry::AB_ASSIGNMENTS_TOTAL,
                "family" => family.to_owned(),
                "arm" => arm.as_str(),
            )
            .increment(1);
            if arm == Arm::Test {
                debug!(family, test_id = %test.test_id, version = %test.test_version_id, "assigned to test arm");
                return Some(ResolvedVersion {
                    version_id: test.test_version_id.clone(),
                    source: VersionSource::AbTest {
                        test_id: test.test_id.clone(),
                    },
                });
            }
        }
        None
    }

    /// Concrete version for `family` on `channel`. Never fails.
    pub async fn select_version(
        &self,
        family: &str,
        channel: &str,
        user_id: Option<&str>,
    ) -> ResolvedVersion {
        if let Some(version) = self.check_ab_test(family, user_id).await {
            return version;
        }
        self.resolve_channel(family, channel).await
    }

    /// Append a history record promoting `new_version` on the stable channel.
    pub async fn record_change(
        &self,
        family: &str,
        old_version: Option<&str>,
        new_version: &str,
        reason: &str,
    ) -> Result<VersionRecord> {
        let record = VersionRecord::new(
            family,
            old_version.map(str::to_string),
            new_version,
            reason,
            STABLE_CHANNEL,
            Utc::now(),
        );
        self.append(record.clone()).await?;
        info!(family, old = ?old_version, new = new_version, reason, "recorded version change");
        Ok(record)
    }

    /// Roll `family` back.
    ///
    /// With `target`, the record written at that timestamp has its
    /// `old_version` re-promoted on that record's channel, documented by a
    /// new history record. Without one, cached resolutions are dropped and
    /// the latest stable version is re-resolved.
    pub async fn rollback(
        &self,
        family: &str,
        target: Option<DateTime<Utc>>,
    ) -> Result<ResolvedVersion> {
        let Some(timestamp) = target else {
            self.channels.invalidate_all();
            self.channel_backoff.invalidate_all();
            info!(family, "rollback without target, re-resolving stable version");
            return Ok(self.resolve_channel(family, STABLE_CHANNEL).await);
        };

        let source = self.store.source();
        let record = with_timeout(self.store.timeout(), source.version_at(family, timestamp))
            .await?
            .ok_or_else(|| {
                HeimdallError::InvalidInput(format!(
                    "no version record for '{family}' at {}",
                    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
                ))
            })?;
        let restored = record.old_version.clone().ok_or_else(|| {
            HeimdallError::InvalidInput(format!(
                "version record for '{family}' has no previous version to restore"
            ))
        })?;

        let reason = format!(
            "rollback of {} (recorded {})",
            record.new_version,
            timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        let rollback = VersionRecord::new(
            family,
            Some(record.new_version.clone()),
            restored.clone(),
            reason,
            record.status.clone(),
            Utc::now(),
        );
        self.append(rollback).await?;
        warn!(family, channel = %record.status, from = %record.new_version, to = %restored, "rolled back model version");

        Ok(ResolvedVersion {
            version_id: restored,
            source: VersionSource::Channel {
                channel: record.status,
            },
        })
    }

    async fn append(&self, record: VersionRecord) -> Result<()> {
        let source = self.store.source();
        let family = record.model_family.clone();
        with_timeout(self.store.timeout(), source.append_version(record)).await?;
        self.channels.invalidate_all();
        self.channel_backoff.invalidate_all();
        if let Err(e) = with_timeout(self.store.timeout(), source.invalidate(&family)).await {
            warn!(family = %family, error = %e, "failed to signal invalidation");
        }
        Ok(())
    }

    async fn resolve_channel(&self, family: &str, channel: &str) -> ResolvedVersion {
        let key = (family.to_string(), channel.to_string());
        if let Some(version) = self.channels.get(&key).await {
            return version;
        }
        if self.channel_backoff.contains_key(&key) {
            return self.fallback(family);
        }

        let source = self.store.source();
        match with_timeout(self.store.timeout(), source.latest_version(family, channel)).await {
            Ok(Some(record)) => {
                let version = ResolvedVersion {
                    version_id: record.new_version,
                    source: VersionSource::Channel {
                        channel: channel.to_string(),
                    },
                };
                self.channels.insert(key, version.clone()).await;
                version
            }
            Ok(None) => {
                debug!(family, channel, "no version history, using fallback");
                self.fallback(family)
            }
            Err(e) => {
                warn!(family, channel, error = %e, "version history unavailable, using fallback");
                self.channel_backoff.insert(key, ()).await;
                self.fallback(family)
            }
        }
    }

    fn fallback(&self, family: &str) -> ResolvedVersion {
        let version_id = self
            .fallback_versions
            .get(family)
            .cloned()
            .unwrap_or_else(|| format!("{family}-default"));
        ResolvedVersion {
            version_id,
            source: VersionSource::Fallback,
        }
    }
}
