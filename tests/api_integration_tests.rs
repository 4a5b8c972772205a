//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dscache::{api::create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::from_config(&Config::default()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/set",
            json!({"key": "test_key", "value": "test_value"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, json!({"key": "test_key", "stored": true}));
}

#[tokio::test]
async fn test_set_then_get_structured_value() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            json!({"key": "doc", "value": {"a": [1, 2], "b": null}, "ttl": 60}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(empty_request("GET", "/get/doc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], json!({"a": [1, 2], "b": null}));
}

#[tokio::test]
async fn test_set_then_get_integer_beyond_i64() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "big", "value": u64::MAX})))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/get/big")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"].as_u64(), Some(u64::MAX));
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "get_key", "value": 42})))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/get/get_key")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], 42);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/get/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_get_endpoint_namespaces() {
    let app = create_test_app();

    for (ns, value) in [("1", "value1"), ("2", "value2")] {
        app.clone()
            .oneshot(json_request(
                "PUT",
                "/set",
                json!({"key": "key", "value": value, "namespace": ns}),
            ))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/get/key?namespace=2"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "value2");

    let response = app.oneshot(empty_request("GET", "/get/key")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == ADD Endpoint Tests ==

#[tokio::test]
async fn test_add_endpoint_only_first_wins() {
    let app = create_test_app();

    let first = app
        .clone()
        .oneshot(json_request("POST", "/add", json!({"key": "a", "value": 1})))
        .await
        .unwrap();
    assert_eq!(body_to_json(first.into_body()).await["stored"], true);

    let second = app
        .clone()
        .oneshot(json_request("POST", "/add", json!({"key": "a", "value": 2})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_to_json(second.into_body()).await["stored"], false);

    let response = app.oneshot(empty_request("GET", "/get/a")).await.unwrap();
    assert_eq!(body_to_json(response.into_body()).await["value"], 1);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "gone", "value": "x"})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/del/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, json!({"key": "gone", "deleted": true}));

    let response = app.oneshot(empty_request("GET", "/get/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_unknown_key_succeeds() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("DELETE", "/del/never_set?namespace=ns"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["deleted"], true);
}

// == VACUUM Endpoint Tests ==

#[tokio::test]
async fn test_vacuum_endpoint_reports_sweep() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "old", "value": 1, "ttl": -1})))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "new", "value": 1})))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/vacuum")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["deleted"], 1);
    assert_eq!(json["complete"], true);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 422 for JSON parsing errors by default
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/set", json!({"key": "", "value": "test"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    for (key, ttl) in [("expired", -1), ("live", 60)] {
        let set_response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/set",
                json!({"key": key, "value": "v", "ttl": ttl}),
            ))
            .await
            .unwrap();
        assert_eq!(set_response.status(), StatusCode::OK);
    }

    let get_response = app
        .clone()
        .oneshot(empty_request("GET", "/get/expired"))
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);

    let get_response = app.oneshot(empty_request("GET", "/get/live")).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_vacuum_with_huge_deadline_config() {
    let config = Config {
        sweep_deadline: u64::MAX,
        ..Config::default()
    };
    let app = create_router(AppState::from_config(&config));

    app.clone()
        .oneshot(json_request("PUT", "/set", json!({"key": "old", "value": 1, "ttl": -1})))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/vacuum")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["deleted"], 1);
    assert_eq!(json["complete"], true);
}
