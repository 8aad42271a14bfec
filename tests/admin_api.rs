//! Admin router behaviour without binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use resilience_guard::admin::{setup_admin_router, AdminState};
use resilience_guard::resilience::{CircuitState, Registry};
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::{breaker_config, bulkhead_config, manager_config, DependencyError};

const KEY: &str = "test-admin-key";

fn router(registry: Arc<Registry>) -> Router {
    setup_admin_router(AdminState::new(registry, KEY))
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn trip(registry: &Registry, service: &str) {
    let manager = registry.get_or_create(
        service,
        Some(manager_config(breaker_config(1, 60_000, 30_000, 500), bulkhead_config(2, 2))),
    );
    let _ = manager
        .execute(|| async { Err::<(), _>(DependencyError("down")) })
        .await;
    assert_eq!(manager.circuit_state(), Some(CircuitState::Open));
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = router(Arc::new(Registry::default()));

    let missing = Request::builder()
        .uri("/admin/status")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/status")
        .header("Authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_counts_services() {
    let registry = Arc::new(Registry::default());
    registry.get_or_create("database", None);
    registry.get_or_create("cache", None);

    let response = router(registry).oneshot(authed("GET", "/admin/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["services"], 2);
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn test_health_degrades_with_open_circuit() {
    let registry = Arc::new(Registry::default());
    registry.get_or_create("steady", None);

    let response = router(registry.clone())
        .oneshot(authed("GET", "/admin/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    trip(&registry, "flaky").await;
    let response = router(registry)
        .oneshot(authed("GET", "/admin/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["openCircuits"][0], "flaky");
}

#[tokio::test]
async fn test_stats_are_keyed_by_service() {
    let registry = Arc::new(Registry::default());
    trip(&registry, "flaky").await;

    let response = router(registry).oneshot(authed("GET", "/admin/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["flaky"]["circuitBreaker"]["state"], "OPEN");
    assert_eq!(body["flaky"]["circuitBreaker"]["failures"], 1);
    assert_eq!(body["flaky"]["bulkhead"]["maxConcurrent"], 2);
}

#[tokio::test]
async fn test_reset_closes_circuits() {
    let registry = Arc::new(Registry::default());
    trip(&registry, "flaky").await;

    let response = router(registry.clone())
        .oneshot(authed("POST", "/admin/reset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["reset"], 1);
    assert!(registry.open_circuits().is_empty());
}
