//! Route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::cache::{CacheLookup, CacheRequest};
use crate::error::with_timeout;
use crate::types::{Resolution, ResolutionRequest};
use crate::versioning::ResolvedVersion;
use crate::{DecisionPlane, HeimdallError, PKG_VERSION, Result, version_string};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub plane: Arc<DecisionPlane>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(plane: Arc<DecisionPlane>, request_timeout: Duration) -> Self {
        Self {
            plane,
            request_timeout,
        }
    }
}

/// Body of `POST /v1/versions/rollback`.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackRequest {
    pub model_family: String,
    /// Timestamp of the history record to undo; omitted re-resolves stable.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/v1/resolve", post(resolve))
        .route("/v1/cache/lookup", post(cache_lookup))
        .route("/v1/versions/rollback", post(rollback))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "package": PKG_VERSION,
        "version": version_string(),
    }))
}

async fn resolve(
    State(state): State<AppState>,
    body: std::result::Result<Json<ResolutionRequest>, JsonRejection>,
) -> Result<Json<Resolution>> {
    let Json(request) = body.map_err(rejection)?;
    let resolution = with_timeout(state.request_timeout, state.plane.resolve(&request)).await?;
    Ok(Json(resolution))
}

async fn cache_lookup(
    State(state): State<AppState>,
    body: std::result::Result<Json<CacheRequest>, JsonRejection>,
) -> Result<Json<CacheLookup>> {
    let Json(request) = body.map_err(rejection)?;
    if request.use_case.trim().is_empty() {
        return Err(HeimdallError::InvalidInput("use_case must not be empty".into()));
    }
    Ok(Json(state.plane.lookup_cache(&request).await))
}

async fn rollback(
    State(state): State<AppState>,
    body: std::result::Result<Json<RollbackRequest>, JsonRejection>,
) -> Result<Json<ResolvedVersion>> {
    let Json(request) = body.map_err(rejection)?;
    if request.model_family.trim().is_empty() {
        return Err(HeimdallError::InvalidInput(
            "model_family must not be empty".into(),
        ));
    }
    let version = state
        .plane
        .rollback(&request.model_family, request.timestamp)
        .await?;
    Ok(Json(version))
}

fn rejection(rejection: JsonRejection) -> HeimdallError {
    HeimdallError::InvalidInput(rejection.body_text())
}

impl IntoResponse for HeimdallError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
