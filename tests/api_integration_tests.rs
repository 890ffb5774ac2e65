//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use stock_cache::cache::ManualClock;
use stock_cache::{create_router, AppState};
use tower::ServiceExt;

use common::{body_to_json, clock, local_service, remote_service, MemoryTier};

// == Helper Functions ==

fn create_test_app() -> (Router, Arc<ManualClock>) {
    let clock = clock();
    let state = AppState::new(local_service(clock.clone()));
    (create_router(state), clock)
}

fn put_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "test_key");
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_with_ttl() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(put_json(
            "/set",
            r#"{"key":"ttl_key","value":{"close":[1.0,2.0]},"ttl":60}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(put_json(
            "/set",
            r#"{"key":"stock:quote:AAPL","value":{"price":189.5,"currency":"USD"}}"#,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(empty("GET", "/get/stock:quote:AAPL"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "stock:quote:AAPL");
    assert_eq!(json["value"]["price"], 189.5);
    assert_eq!(json["value"]["currency"], "USD");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty("GET", "/get/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"delete_me","value":1}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty("DELETE", "/del/delete_me"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "delete_me");

    let response = app.oneshot(empty("GET", "/get/delete_me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_key_is_ok() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty("DELETE", "/del/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// == CLEAR Endpoint Tests ==

#[tokio::test]
async fn test_clear_endpoint() {
    let (app, _) = create_test_app();

    for key in ["a", "b", "c"] {
        app.clone()
            .oneshot(put_json("/set", &format!(r#"{{"key":"{key}","value":0}}"#)))
            .await
            .unwrap();
    }

    let response = app.clone().oneshot(empty("POST", "/clear")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["keyCount"], 0);
    assert_eq!(json["local"]["memoryBytes"], 0);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint_local_backend() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"k","value":"v"}"#))
        .await
        .unwrap();
    app.clone().oneshot(empty("GET", "/get/k")).await.unwrap();
    app.clone().oneshot(empty("GET", "/get/missing")).await.unwrap();

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["backend"], "local");
    assert_eq!(json["keyCount"], 1);
    assert_eq!(json["remoteAvailable"], false);
    assert_eq!(json["local"]["hits"], 1);
    assert_eq!(json["local"]["misses"], 1);
    assert_eq!(json["local"]["totalEntries"], 1);
    assert!(json["approxMemory"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_stats_endpoint_remote_backend() {
    let tier = MemoryTier::new();
    let (service, _) = remote_service(tier, clock());
    let app = create_router(AppState::new(service));

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"k","value":"v"}"#))
        .await
        .unwrap();

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["backend"], "remote");
    assert_eq!(json["keyCount"], 1);
    assert_eq!(json["approxMemory"], "1.50M");
    assert_eq!(json["remoteAvailable"], true);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["remoteAvailable"], false);
    assert!(json.get("timestamp").is_some());
}

// == SNAPSHOT Endpoint Tests ==

#[tokio::test]
async fn test_snapshot_endpoint_without_destination() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty("POST", "/snapshot")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key": "incomplete"#))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"","value":"test"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let (app, clock) = create_test_app();

    app.clone()
        .oneshot(put_json(
            "/set",
            r#"{"key":"stock:prices:AAPL:1D","value":[187.1,189.5],"ttl":86400}"#,
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty("GET", "/get/stock:prices:AAPL:1D"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance(Duration::from_secs(86_401));

    let response = app
        .oneshot(empty("GET", "/get/stock:prices:AAPL:1D"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
