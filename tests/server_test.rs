//! HTTP surface tests driven through the router with `tower::ServiceExt::oneshot`.

#![cfg(feature = "server")]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use heimdall::config::InMemoryConfigSource;
use heimdall::server::{AppState, router};
use heimdall::{AccessConfig, Environment, Heimdall, SelectionRule};

fn app_with(config: AccessConfig) -> axum::Router {
    let plane = Heimdall::builder()
        .config_source(Arc::new(InMemoryConfigSource::with_access_config(config)))
        .environment(Environment::Production)
        .build()
        .unwrap();
    router(AppState::new(Arc::new(plane), Duration::from_secs(5)))
}

fn app() -> axum::Router {
    app_with(AccessConfig::minimal_default())
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_and_version() {
    let (status, body) = send(app(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app(), Request::get("/version").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["package"], heimdall::PKG_VERSION);
}

#[tokio::test]
async fn resolve_returns_clamped_resolution() {
    let (status, body) = send(
        app(),
        post(
            "/v1/resolve",
            json!({
                "use_case": "medical_summary",
                "model_family": "claude",
                "profile": "balanced",
                "custom_params": {"max_tokens": 20000}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["inference_params"]["max_tokens"], 16384);
    assert!(body["inference_params"]["temperature"].as_f64().unwrap() <= 0.3);
    assert_eq!(body["model_key"], "default");
    assert_eq!(body["version_source"]["kind"], "fallback");
}

#[tokio::test]
async fn malformed_body_is_400_envelope() {
    let (status, body) = send(app(), post("/v1/resolve", json!({"use_case": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn blank_use_case_is_400() {
    let (status, body) = send(
        app(),
        post("/v1/resolve", json!({"use_case": " ", "model_family": "claude"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
}

#[tokio::test]
async fn missing_rule_is_500_configuration_error() {
    let config = AccessConfig {
        selection_rules: HashMap::from([(
            "only_this".to_string(),
            SelectionRule {
                primary: "default".into(),
                fallback: None,
            },
        )]),
        ..AccessConfig::minimal_default()
    };
    let (status, body) = send(
        app_with(config),
        post(
            "/v1/resolve",
            json!({"use_case": "general_chat", "model_family": "claude"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ConfigurationError");
}

#[tokio::test]
async fn cache_lookup_miss_is_success() {
    let (status, body) = send(
        app(),
        post(
            "/v1/cache/lookup",
            json!({"use_case": "general_chat", "prompt": "hello"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    assert!(body.get("response").is_none());
}

#[tokio::test]
async fn rollback_to_unknown_record_is_400() {
    let (status, body) = send(
        app(),
        post(
            "/v1/versions/rollback",
            json!({"model_family": "claude", "timestamp": "2024-01-01T00:00:00Z"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
}

#[tokio::test]
async fn rollback_without_timestamp_re_resolves() {
    let (status, body) = send(
        app(),
        post("/v1/versions/rollback", json!({"model_family": "claude"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version_id"], "claude-default");
}
