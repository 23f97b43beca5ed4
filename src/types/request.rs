//! Resolution request and response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HeimdallError, Result};

/// Generic, family-independent inference parameter set.
pub type Params = serde_json::Map<String, Value>;

/// Inbound request asking which model, version, and parameters to use.
///
/// ```rust
/// # use heimdall::ResolutionRequest;
/// let request = ResolutionRequest::new("medical_summary", "claude")
///     .profile("balanced")
///     .user_id("user-42");
/// assert_eq!(request.profile.as_deref(), Some("balanced"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub use_case: String,
    pub model_family: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub custom_params: Option<Params>,
    /// Release channel; defaults to "stable".
    #[serde(default)]
    pub channel: Option<String>,
    /// Identified callers are bucketed deterministically into A/B arms.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Opaque caller context, passed through to model selection.
    #[serde(default)]
    pub context: Option<Value>,
}

impl ResolutionRequest {
    pub fn new(use_case: impl Into<String>, model_family: impl Into<String>) -> Self {
        Self {
            use_case: use_case.into(),
            model_family: model_family.into(),
            ..Self::default()
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn custom_params(mut self, params: Params) -> Self {
        self.custom_params = Some(params);
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Reject requests that can never be routed.
    pub fn validate(&self) -> Result<()> {
        if self.use_case.trim().is_empty() {
            return Err(HeimdallError::InvalidInput("use_case must not be empty".into()));
        }
        if self.model_family.trim().is_empty() {
            return Err(HeimdallError::InvalidInput(
                "model_family must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// How the concrete model version was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSource {
    /// Bucketed into the test arm of an active experiment.
    AbTest { test_id: String },
    /// Latest history record on the requested channel.
    Channel { channel: String },
    /// History unavailable; synthetic version served.
    Fallback,
}

/// Everything the invocation collaborator needs to call the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub model_key: String,
    pub model_id: String,
    pub model_version: String,
    pub version_source: VersionSource,
    /// Merged and clamped generic parameters, including governance keys.
    pub parameters: Params,
    /// Parameters already in the model family's wire shape.
    pub inference_params: Value,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// True when the selection rule's primary was unavailable.
    pub fallback_used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default_when_absent() {
        let request: ResolutionRequest =
            serde_json::from_str(r#"{"use_case": "debug", "model_family": "claude"}"#).unwrap();
        assert!(request.profile.is_none());
        assert!(request.custom_params.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_use_case_is_invalid() {
        let request = ResolutionRequest::new("  ", "claude");
        assert!(matches!(
            request.validate(),
            Err(HeimdallError::InvalidInput(_))
        ));
    }

    #[test]
    fn version_source_is_tagged() {
        let json = serde_json::to_value(VersionSource::AbTest {
            test_id: "t1".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "ab_test");
        assert_eq!(json["test_id"], "t1");
    }
}
