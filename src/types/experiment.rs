//! A/B experiment definitions and version history records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Release channel that [`VersionRecord`]s are written to by default.
pub const STABLE_CHANNEL: &str = "stable";

/// History records expire this many days after they are written.
pub const VERSION_RETENTION_DAYS: i64 = 90;

/// Lifecycle state of an experiment. Only `Active` tests affect routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbTestStatus {
    Active,
    Paused,
    Completed,
}

/// Traffic percentages per arm. `test` is the share (0–100) routed to the
/// test version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSplit {
    pub control: u8,
    pub test: u8,
}

/// An experiment comparing a test version against channel-based resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbTest {
    pub test_id: String,
    pub model_family: String,
    pub status: AbTestStatus,
    pub split: TrafficSplit,
    pub test_version_id: String,
}

impl AbTest {
    /// Whether this test currently applies to `family`.
    pub fn applies_to(&self, family: &str) -> bool {
        self.status == AbTestStatus::Active && self.model_family == family
    }
}

/// Experiment arm a request was bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Control,
    Test,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Test => "test",
        }
    }
}

/// Immutable, append-only record of a version change for a model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub model_family: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub old_version: Option<String>,
    pub new_version: String,
    pub reason: String,
    /// Channel this record promotes `new_version` on (e.g. "stable", "canary").
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Build a record stamped at `timestamp`, expiring after the retention window.
    pub fn new(
        model_family: impl Into<String>,
        old_version: Option<String>,
        new_version: impl Into<String>,
        reason: impl Into<String>,
        status: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            model_family: model_family.into(),
            timestamp,
            old_version,
            new_version: new_version.into(),
            reason: reason.into(),
            status: status.into(),
            expires_at: timestamp + Duration::days(VERSION_RETENTION_DAYS),
        }
    }

    /// Whether the record has outlived its retention window at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_expires_after_retention_window() {
        let now = Utc::now();
        let record = VersionRecord::new("claude", None, "v2", "upgrade", STABLE_CHANNEL, now);
        assert_eq!(record.expires_at - record.timestamp, Duration::days(90));
        assert!(!record.is_expired(now + Duration::days(89)));
        assert!(record.is_expired(now + Duration::days(90)));
    }

    #[test]
    fn only_active_tests_apply() {
        let mut test = AbTest {
            test_id: "t1".into(),
            model_family: "claude".into(),
            status: AbTestStatus::Active,
            split: TrafficSplit {
                control: 50,
                test: 50,
            },
            test_version_id: "v3".into(),
        };
        assert!(test.applies_to("claude"));
        assert!(!test.applies_to("titan"));
        test.status = AbTestStatus::Paused;
        assert!(!test.applies_to("claude"));
    }

    #[test]
    fn status_uses_snake_case() {
        let status: AbTestStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, AbTestStatus::Completed);
    }
}
