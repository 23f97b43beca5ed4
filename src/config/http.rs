//! REST-backed configuration source.
//!
//! Layout, relative to the configured base URL:
//!
//! | Method | Path | Body / result |
//! |--------|------|---------------|
//! | `GET`  | `/access-config` | [`AccessConfig`] |
//! | `GET`  | `/ab-tests` | `[AbTest]` |
//! | `GET`  | `/versions/latest?family=&status=` | [`VersionRecord`], 404 when none |
//! | `GET`  | `/versions/at?family=&timestamp=` | [`VersionRecord`], 404 when none |
//! | `POST` | `/versions` | [`VersionRecord`] to append |
//! | `POST` | `/invalidate` | `{"scope": "..."}` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ConfigSource;
use crate::types::{AbTest, AccessConfig, VersionRecord};
use crate::{HeimdallError, Result};

/// Default per-request timeout for configuration calls.
pub const DEFAULT_CONFIG_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration source talking to a REST store.
pub struct HttpConfigSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigSource {
    /// Create a source for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_CONFIG_TIMEOUT)
    }

    /// Create a source whose every request is bounded by `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeimdallError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "fetching configuration");
        let response = self.client.get(&url).send().await?;
        check_status(&url, response.status())?;
        Ok(response.json().await?)
    }

    /// GET a record, mapping 404 to `None`.
    async fn get_record(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<VersionRecord>> {
        let url = self.url(path);
        let response = self.client.get(&url).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(&url, response.status())?;
        Ok(Some(response.json().await?))
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let url = self.url(path);
        let response = self.client.post(&url).json(body).send().await?;
        check_status(&url, response.status())
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(HeimdallError::UpstreamConfigUnavailable(format!(
            "{url} returned HTTP {status}"
        )))
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn access_config(&self) -> Result<AccessConfig> {
        self.get_json("/access-config").await
    }

    async fn ab_tests(&self) -> Result<Vec<AbTest>> {
        self.get_json("/ab-tests").await
    }

    async fn latest_version(&self, family: &str, channel: &str) -> Result<Option<VersionRecord>> {
        let record = self
            .get_record("/versions/latest", &[("family", family), ("status", channel)])
            .await?;
        // The store is expected to drop expired records itself; don't trust it to.
        Ok(record.filter(|r| !r.is_expired(Utc::now())))
    }

    async fn version_at(
        &self,
        family: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<VersionRecord>> {
        let ts = timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.get_record("/versions/at", &[("family", family), ("timestamp", &ts)])
            .await
    }

    async fn append_version(&self, record: VersionRecord) -> Result<()> {
        self.post_json("/versions", &serde_json::to_value(&record)?)
            .await
    }

    async fn invalidate(&self, scope: &str) -> Result<()> {
        self.post_json("/invalidate", &serde_json::json!({ "scope": scope }))
            .await
    }
}
