//! Admin API tests, driven in-process through the router.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use inference_gate::config::AdminConfig;
use inference_gate::http::{AdminServer, AppState};
use inference_gate::AdmissionGate;

mod common;
use common::MockProvider;

const KEY: &str = "test-admin-key";

fn app(gate: std::sync::Arc<AdmissionGate>) -> (Router, AppState) {
    let admin = AdminConfig {
        api_key: KEY.to_string(),
        ..AdminConfig::default()
    };
    let state = AppState::new(gate, admin);
    (AdminServer::build_router(state.clone()), state)
}

fn request(method: Method, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Authenticated POST with an empty body.
fn post(uri: &str) -> Request<Body> {
    request(Method::POST, uri, Some(KEY))
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app(common::gate(&common::config(50.0, 5, 60_000)));

    let response = app
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_admin_routes_require_bearer_token() {
    let (app, _) = app(common::gate(&common::config(50.0, 5, 60_000)));

    let missing = app
        .clone()
        .oneshot(request(Method::GET, "/admin/status", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(request(Method::GET, "/admin/status", Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .oneshot(request(Method::GET, "/admin/status", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body = json(ok).await;
    assert_eq!(body["status"], "operational");
    assert_eq!(body["store_healthy"], true);
}

#[tokio::test]
async fn test_rotated_key_applies_without_restart() {
    let (app, state) = app(common::gate(&common::config(50.0, 5, 60_000)));

    state.admin.store(std::sync::Arc::new(AdminConfig {
        api_key: "rotated".to_string(),
        ..AdminConfig::default()
    }));

    let old = app
        .clone()
        .oneshot(request(Method::GET, "/admin/breakers", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = app
        .oneshot(request(Method::GET, "/admin/breakers", Some("rotated")))
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_open_then_reset_breaker() {
    let gate = common::gate(&common::config(50.0, 5, 60_000));
    let (app, _) = app(std::sync::Arc::clone(&gate));

    let opened = app
        .clone()
        .oneshot(post("/admin/breakers/openai/open"))
        .await
        .unwrap();
    assert_eq!(opened.status(), StatusCode::OK);
    assert_eq!(json(opened).await["state"], "open");

    let provider = MockProvider::new();
    let refused = gate
        .admit("acme", "openai", 1.0, || provider.complete("hi"))
        .await;
    assert!(refused.is_err());
    assert_eq!(provider.calls(), 0);

    let listed = app
        .clone()
        .oneshot(request(Method::GET, "/admin/breakers", Some(KEY)))
        .await
        .unwrap();
    let breakers = json(listed).await;
    assert_eq!(breakers[0]["dependency"], "openai");
    assert_eq!(breakers[0]["state"], "open");

    let reset = app
        .oneshot(post("/admin/breakers/openai/reset"))
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    let body = json(reset).await;
    assert_eq!(body["state"], "closed");
    assert_eq!(body["failure_count"], 0);

    gate.admit("acme", "openai", 1.0, || provider.complete("hi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_unknown_breaker_is_not_found() {
    let (app, _) = app(common::gate(&common::config(50.0, 5, 60_000)));

    let response = app
        .oneshot(post("/admin/breakers/nobody/reset"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_budget_snapshot_reports_spend() {
    let gate = common::gate(&common::config(50.0, 5, 60_000));
    let provider = MockProvider::new();
    gate.admit("acme", "openai", 12.5, || provider.complete("hi"))
        .await
        .unwrap();
    let (app, _) = app(gate);

    let response = app
        .oneshot(request(Method::GET, "/admin/budget/acme", Some(KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["tenant"], "acme");
    assert_eq!(body["spend"], 12.5);
    assert_eq!(body["limit"], 50.0);
    assert_eq!(body["remaining"], 37.5);
    assert_eq!(body["status"], "ok");
}
