//! In-process configuration source.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ConfigSource;
use crate::types::{AbTest, AccessConfig, VersionRecord};
use crate::{HeimdallError, Result};

/// Serialized form of everything an [`InMemoryConfigSource`] holds.
///
/// This is also the on-disk format accepted by [`InMemoryConfigSource::from_file`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// `None` makes [`ConfigSource::access_config`] fail, as an unreachable store would.
    #[serde(default)]
    pub access_config: Option<AccessConfig>,
    #[serde(default)]
    pub ab_tests: Vec<AbTest>,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

/// Configuration source backed by an in-memory [`ConfigSnapshot`].
///
/// Appends are kept in memory only.
pub struct InMemoryConfigSource {
    state: RwLock<ConfigSnapshot>,
}

impl InMemoryConfigSource {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Source serving `config` with no experiments or history.
    pub fn with_access_config(config: AccessConfig) -> Self {
        Self::new(ConfigSnapshot {
            access_config: Some(config),
            ..ConfigSnapshot::default()
        })
    }

    /// Load a JSON snapshot file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeimdallError::Configuration(format!("failed to read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: ConfigSnapshot = serde_json::from_str(&content).map_err(|e| {
            HeimdallError::Configuration(format!(
                "failed to parse snapshot {}: {e}",
                path.display()
            ))
        })?;
        info!(
            path = %path.display(),
            ab_tests = snapshot.ab_tests.len(),
            versions = snapshot.versions.len(),
            "loaded configuration snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Replace the access configuration (`None` simulates an outage).
    pub fn set_access_config(&self, config: Option<AccessConfig>) -> Result<()> {
        self.write()?.access_config = config;
        Ok(())
    }

    /// Replace the experiment definitions.
    pub fn set_ab_tests(&self, tests: Vec<AbTest>) -> Result<()> {
        self.write()?.ab_tests = tests;
        Ok(())
    }

    /// All history records, oldest first.
    pub fn history(&self) -> Result<Vec<VersionRecord>> {
        Ok(self.read()?.versions.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, ConfigSnapshot>> {
        self.state.read().map_err(|e| {
            HeimdallError::UpstreamConfigUnavailable(format!("failed to acquire read lock: {e}"))
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, ConfigSnapshot>> {
        self.state.write().map_err(|e| {
            HeimdallError::UpstreamConfigUnavailable(format!("failed to acquire write lock: {e}"))
        })
    }
}

#[async_trait]
impl ConfigSource for InMemoryConfigSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn access_config(&self) -> Result<AccessConfig> {
        self.read()?.access_config.clone().ok_or_else(|| {
            HeimdallError::UpstreamConfigUnavailable("no access configuration loaded".into())
        })
    }

    async fn ab_tests(&self) -> Result<Vec<AbTest>> {
        Ok(self.read()?.ab_tests.clone())
    }

    async fn latest_version(&self, family: &str, channel: &str) -> Result<Option<VersionRecord>> {
        let now = Utc::now();
        Ok(self
            .read()?
            .versions
            .iter()
            .filter(|r| r.model_family == family && r.status == channel && !r.is_expired(now))
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    async fn version_at(
        &self,
        family: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<VersionRecord>> {
        Ok(self
            .read()?
            .versions
            .iter()
            .find(|r| r.model_family == family && r.timestamp == timestamp)
            .cloned())
    }

    async fn append_version(&self, record: VersionRecord) -> Result<()> {
        self.write()?.versions.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::STABLE_CHANNEL;
    use chrono::Duration;

    fn record(family: &str, version: &str, status: &str, at: DateTime<Utc>) -> VersionRecord {
        VersionRecord::new(family, None, version, "test", status, at)
    }

    #[tokio::test]
    async fn latest_version_picks_newest_on_channel() {
        let now = Utc::now();
        let source = InMemoryConfigSource::new(ConfigSnapshot {
            versions: vec![
                record("claude", "v1", STABLE_CHANNEL, now - Duration::hours(2)),
                record("claude", "v2", STABLE_CHANNEL, now - Duration::hours(1)),
                record("claude", "v3", "canary", now),
                record("titan", "t1", STABLE_CHANNEL, now),
            ],
            ..ConfigSnapshot::default()
        });

        let latest = source.latest_version("claude", STABLE_CHANNEL).await.unwrap();
        assert_eq!(latest.unwrap().new_version, "v2");
        let canary = source.latest_version("claude", "canary").await.unwrap();
        assert_eq!(canary.unwrap().new_version, "v3");
        assert!(source.latest_version("llama", STABLE_CHANNEL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_records_are_ignored() {
        let long_ago = Utc::now() - Duration::days(120);
        let source = InMemoryConfigSource::new(ConfigSnapshot {
            versions: vec![record("claude", "v0", STABLE_CHANNEL, long_ago)],
            ..ConfigSnapshot::default()
        });
        assert!(source.latest_version("claude", STABLE_CHANNEL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_access_config_is_an_upstream_error() {
        let source = InMemoryConfigSource::new(ConfigSnapshot::default());
        let err = source.access_config().await.unwrap_err();
        assert!(matches!(err, HeimdallError::UpstreamConfigUnavailable(_)));
    }

    #[test]
    fn from_file_parses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"access_config": {"selection_rules": {"default": {"primary": "haiku"}}}}"#,
        )
        .unwrap();
        let source = InMemoryConfigSource::from_file(&path).unwrap();
        assert!(source.read().unwrap().access_config.is_some());
    }

    #[test]
    fn from_missing_file_is_configuration_error() {
        let result = InMemoryConfigSource::from_file(Path::new("/nonexistent/snapshot.json"));
        assert!(matches!(result, Err(HeimdallError::Configuration(_))));
    }
}
