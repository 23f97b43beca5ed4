//! The per-request decision pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::invoker::ModelInvoker;
use crate::cache::{CacheLookup, CacheManager, CacheRequest, TierKind};
use crate::config::ConfigStore;
use crate::endpoint::{EndpointSelector, SelectionRole};
use crate::error::with_timeout;
use crate::params::ParameterSelector;
use crate::types::{Params, Resolution, ResolutionRequest, STABLE_CHANNEL};
use crate::versioning::{ResolvedVersion, VersionManager};
use crate::{HeimdallError, Result};

/// Result of [`DecisionPlane::handle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandledRequest {
    pub resolution: Resolution,
    pub response: Value,
    pub cached: bool,
    /// Tier that served a cached response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierKind>,
}

/// Context object owning every component of the decision plane.
///
/// Construct with [`Heimdall::builder()`](super::Heimdall::builder). One
/// instance per worker; it is `Send + Sync` and meant to be shared behind an
/// `Arc`. Worker-local state (rate windows, health readings, cached
/// configuration) lives here and is lost on restart.
pub struct DecisionPlane {
    pub(super) store: Arc<ConfigStore>,
    pub(super) params: ParameterSelector,
    pub(super) versions: VersionManager,
    pub(super) endpoints: EndpointSelector,
    pub(super) cache: CacheManager,
    pub(super) invoker: Option<Arc<dyn ModelInvoker>>,
}

impl DecisionPlane {
    /// Decide model, version, and parameters for `request`.
    ///
    /// Stages run in order: parameters, version, endpoint availability.
    /// The only errors are an invalid request, a missing selection rule,
    /// and no available model.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution> {
        request.validate()?;

        let parameters = self.params.select(request);

        let channel = request.channel.as_deref().unwrap_or(STABLE_CHANNEL);
        let version = self
            .versions
            .select_version(&request.model_family, channel, request.user_id.as_deref())
            .await;

        let selection = self
            .endpoints
            .select_model(&request.use_case, request.context.as_ref())
            .await?;

        let inference_params = self
            .params
            .format_for_family(&request.model_family, &parameters);

        debug!(
            use_case = %request.use_case,
            model = %selection.config.model_key,
            version = %version.version_id,
            "resolved request"
        );

        Ok(Resolution {
            model_key: selection.config.model_key,
            model_id: selection.config.model_id,
            model_version: version.version_id,
            version_source: version.source,
            parameters,
            inference_params,
            timeout_seconds: selection.config.timeout_secs,
            retry_attempts: selection.config.retry_attempts,
            fallback_used: selection.role == SelectionRole::Fallback,
        })
    }

    /// Resolve, consult the cache, and invoke the model on a miss.
    ///
    /// `payload` carries the request content (`messages`, `prompt`, ...). It
    /// is merged into the family-shaped body sent to the invoker and, with
    /// the resolved model, version, and parameters, forms the cache key.
    /// A failed invocation marks the model unhealthy so the next request
    /// fails over.
    pub async fn handle(
        &self,
        request: &ResolutionRequest,
        payload: Params,
    ) -> Result<HandledRequest> {
        let resolution = self.resolve(request).await?;
        let cache_request = cache_request_for(&request.use_case, &resolution, &payload);

        let lookup = self.cache.get(&cache_request).await;
        if let Some(entry) = lookup.response {
            return Ok(HandledRequest {
                resolution,
                response: entry.payload,
                cached: true,
                tier: Some(entry.tier),
            });
        }

        let invoker = self.invoker.as_ref().ok_or_else(|| {
            HeimdallError::Configuration("no model invoker configured".into())
        })?;

        let mut body = resolution.inference_params.clone();
        if let Value::Object(fields) = &mut body {
            fields.extend(payload);
        }

        let limit = Duration::from_secs(resolution.timeout_seconds);
        let response =
            match with_timeout(limit, invoker.invoke(&resolution.model_id, &body)).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        model = %resolution.model_key,
                        invoker = invoker.name(),
                        error = %e,
                        "invocation failed, marking model unhealthy"
                    );
                    self.endpoints.mark_health(&resolution.model_key, false).await;
                    return Err(e);
                }
            };

        self.endpoints
            .update_usage(&resolution.model_key, response.tokens_used);
        self.cache
            .set(&cache_request, response.payload.clone())
            .await;

        Ok(HandledRequest {
            resolution,
            response: response.payload,
            cached: false,
            tier: None,
        })
    }

    /// Direct cache lookup for callers that invoke models themselves.
    pub async fn lookup_cache(&self, request: &CacheRequest) -> CacheLookup {
        self.cache.get(request).await
    }

    /// Roll `family` back; see [`VersionManager::rollback`].
    pub async fn rollback(
        &self,
        family: &str,
        target: Option<DateTime<Utc>>,
    ) -> Result<ResolvedVersion> {
        let version = self.versions.rollback(family, target).await?;
        info!(family, version = %version.version_id, "rollback complete");
        Ok(version)
    }

    /// Drop the cached access configuration.
    pub async fn invalidate_config(&self) {
        self.store.invalidate().await;
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn endpoints(&self) -> &EndpointSelector {
        &self.endpoints
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn params(&self) -> &ParameterSelector {
        &self.params
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.store
    }
}

/// Cache fields for a resolved request: generic parameters, then the
/// resolved model and version, then request content.
fn cache_request_for(use_case: &str, resolution: &Resolution, payload: &Params) -> CacheRequest {
    let mut request = CacheRequest::new(use_case);
    request.fields.extend(resolution.parameters.clone());
    request.fields.extend(payload.clone());
    request
        .field("model_id", resolution.model_id.as_str())
        .field("model_version", resolution.model_version.as_str())
}
