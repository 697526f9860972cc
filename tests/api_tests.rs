//! HTTP surface tests driven through the router with `oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use mcp_registry::index::{HashingEmbedder, SearchIndex, VectorIndex};
use mcp_registry::repositories::{InMemoryServerRepository, ServerRepository};
use mcp_registry::services::{DiscoveryService, RegistrationService};
use mcp_registry::test_utils::test_helpers::ScriptedIntrospector;
use mcp_registry::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

fn setup_app(introspector: ScriptedIntrospector) -> Router {
    let store: Arc<dyn ServerRepository> = Arc::new(InMemoryServerRepository::new());
    let index: Arc<dyn SearchIndex> =
        Arc::new(VectorIndex::new(Arc::new(HashingEmbedder::new())));

    let registration_service = Arc::new(RegistrationService::new(
        store.clone(),
        index.clone(),
        Arc::new(introspector),
        Duration::from_secs(5),
    ));
    let discovery_service = Arc::new(DiscoveryService::new(
        store,
        index,
        5,
        Duration::from_secs(5),
    ));

    create_router(AppState {
        registration_service,
        discovery_service,
    })
}

fn calculator() -> ScriptedIntrospector {
    ScriptedIntrospector::with_tools(&[
        ("calculate_sum", "Add two numbers"),
        ("multiply", "Multiply two numbers"),
    ])
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register_calculator(app: &Router) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/register_server",
            json!({
                "id": "calc",
                "name": "Calculator",
                "description": "Arithmetic tools",
                "url": "http://calc.internal/sse",
                "tags": ["math"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
}

#[tokio::test]
async fn test_health() {
    let app = setup_app(calculator());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_register_server() {
    let app = setup_app(calculator());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/register_server",
            json!({
                "name": "Calculator",
                "description": "Arithmetic tools",
                "url": "http://calc.internal",
                "tools": [{"name": "ignored", "input_schema": {}}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "registered");
    assert_eq!(body["tool_count"], 2);
    assert!(body["server_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_register_validation_error_envelope() {
    let app = setup_app(calculator());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/register_server",
            json!({"name": "", "description": "Arithmetic", "url": "http://calc.internal"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert!(body["detail"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_register_unreachable_endpoint() {
    let app = setup_app(ScriptedIntrospector::failing());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/register_server",
            json!({"name": "Calculator", "description": "Arithmetic", "url": "http://calc.internal"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "introspection_failed");

    let request = Request::builder().uri("/servers").body(Body::empty()).unwrap();
    let (_, servers) = send(&app, request).await;
    assert_eq!(servers, json!([]));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = setup_app(calculator());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register_server")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert!(status.is_client_error());

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/search_tools", json!({"top_k": 3})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_heartbeat_via_query_and_body() {
    let app = setup_app(calculator());
    register_calculator(&app).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/heartbeat?server_id=calc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"server_id": "calc", "status": "heartbeat updated"}));

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/heartbeat", json!({"server_id": "calc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server_id"], "calc");
}

#[tokio::test]
async fn test_heartbeat_errors() {
    let app = setup_app(calculator());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/heartbeat?server_id=ghost")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "server_not_found");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/heartbeat")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_search_tools() {
    let app = setup_app(calculator());
    register_calculator(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/search_tools",
            json!({"query": "add two numbers", "top_k": 1}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let matches = body.as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["server_id"], "calc");
    assert_eq!(matches[0]["tool_name"], "calculate_sum");
    assert_eq!(matches[0]["server_name"], "Calculator");
    assert!(matches[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_search_tools_out_of_range_top_k() {
    let app = setup_app(calculator());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/search_tools",
            json!({"query": "add", "top_k": 500}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_find_server() {
    let app = setup_app(calculator());
    register_calculator(&app).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/find_server", json!({"query": "add two numbers"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched_tool"]["tool_name"], "calculate_sum");
    assert_eq!(body["server"]["id"], "calc");
    assert_eq!(body["server"]["url"], "http://calc.internal");
    assert_eq!(body["server"]["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_find_server_without_match() {
    let app = setup_app(calculator());

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/find_server", json!({"query": "add two numbers"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_matching_server");
}

#[tokio::test]
async fn test_list_and_get_servers() {
    let app = setup_app(calculator());
    register_calculator(&app).await;

    let request = Request::builder().uri("/servers").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "calc");
    assert_eq!(body[0]["tags"], json!(["math"]));

    let request = Request::builder()
        .uri("/servers/calc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Calculator");
    assert_eq!(body["list_tools_endpoint"], "/sse");

    let request = Request::builder()
        .uri("/servers/ghost")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "server_not_found");
}
