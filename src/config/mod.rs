//! Configuration collaborator.
//!
//! The decision plane reads point-in-time snapshots (access configuration,
//! experiments, version history) through [`ConfigSource`] and writes back
//! only two things: version-history appends and invalidation signals.
//!
//! - [`InMemoryConfigSource`]: snapshot held in process, loadable from a
//!   JSON file. Used for tests and single-node deployments.
//! - [`HttpConfigSource`]: REST-backed store fetched with `reqwest`.
//! - [`ConfigStore`]: caches the access configuration for five minutes and
//!   degrades to [`AccessConfig::minimal_default`] when the source fails.

pub mod http;
pub mod memory;
pub mod store;

pub use http::HttpConfigSource;
pub use memory::{ConfigSnapshot, InMemoryConfigSource};
pub use store::ConfigStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;
use crate::types::{AbTest, AccessConfig, VersionRecord};

/// Source of versioned routing, experiment, and version-history data.
///
/// Implementations should return errors rather than fabricate data; the
/// callers decide how to degrade.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Current access configuration snapshot.
    async fn access_config(&self) -> Result<AccessConfig>;

    /// All experiment definitions (the caller filters by status).
    async fn ab_tests(&self) -> Result<Vec<AbTest>>;

    /// Most recent unexpired history record for `family` whose status equals `channel`.
    async fn latest_version(&self, family: &str, channel: &str) -> Result<Option<VersionRecord>>;

    /// The history record for `family` written at exactly `timestamp`.
    async fn version_at(
        &self,
        family: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<VersionRecord>>;

    /// Append an immutable history record.
    async fn append_version(&self, record: VersionRecord) -> Result<()>;

    /// Signal that cached data for `scope` (e.g. a model family) is stale.
    ///
    /// Default: no-op, for sources without downstream caches.
    async fn invalidate(&self, _scope: &str) -> Result<()> {
        Ok(())
    }
}
