use mcp_registry::error::AppError;
use mcp_registry::index::{HashingEmbedder, SearchIndex, VectorIndex};
use mcp_registry::mcp::EndpointIntrospector;
use mcp_registry::models::{HttpMethod, RegisterServerRequest, SearchDocument, TransportKind};
use mcp_registry::repositories::{InMemoryServerRepository, ServerRepository, SqliteServerRepository};
use mcp_registry::services::RegistrationService;
use mcp_registry::test_utils::test_helpers::{create_test_pool, sample_request, ScriptedIntrospector};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Registry {
    service: RegistrationService,
    store: Arc<dyn ServerRepository>,
    index: Arc<VectorIndex>,
    introspector: ScriptedIntrospector,
}

fn registry_with_store(store: Arc<dyn ServerRepository>) -> Registry {
    let index = Arc::new(VectorIndex::new(Arc::new(HashingEmbedder::new())));
    let introspector = ScriptedIntrospector::with_tools(&[
        ("calculate_sum", "Add two numbers"),
        ("multiply", "Multiply two numbers"),
    ]);
    let service = RegistrationService::new(
        store.clone(),
        index.clone(),
        Arc::new(introspector.clone()),
        Duration::from_secs(5),
    );

    Registry {
        service,
        store,
        index,
        introspector,
    }
}

fn registry() -> Registry {
    registry_with_store(Arc::new(InMemoryServerRepository::new()))
}

#[tokio::test]
async fn test_register_generates_id_and_snapshots_tools() {
    let registry = registry();

    let receipt = registry.service.register(sample_request()).await.unwrap();

    assert_eq!(receipt.status, "registered");
    assert_eq!(receipt.tool_count, 2);
    assert!(uuid::Uuid::parse_str(&receipt.server_id).is_ok());

    let record = registry.store.get(&receipt.server_id).await.unwrap().unwrap();
    assert_eq!(record.name, "Calculator");
    assert_eq!(record.url, "http://calc.internal");
    assert_eq!(record.tags, vec!["math".to_string()]);
    assert_eq!(record.created_at, record.last_heartbeat);
    assert_eq!(
        record.tool_names().collect::<Vec<_>>(),
        vec!["calculate_sum", "multiply"]
    );

    assert_eq!(registry.index.len().await, 2);
    assert!(
        registry
            .index
            .contains(&SearchDocument::document_id(&receipt.server_id, "calculate_sum"))
            .await
    );
}

#[tokio::test]
async fn test_supplied_id_is_kept() {
    let registry = registry();
    let mut request = sample_request();
    request.id = Some("calc".to_string());

    let receipt = registry.service.register(request).await.unwrap();

    assert_eq!(receipt.server_id, "calc");
    assert!(registry.store.get("calc").await.unwrap().is_some());
}

#[tokio::test]
async fn test_reregistration_keeps_created_at_and_prunes_tools() {
    let registry = registry();
    let mut request = sample_request();
    request.id = Some("calc".to_string());

    registry.service.register(request.clone()).await.unwrap();
    let first = registry.store.get("calc").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    registry
        .introspector
        .set_tools(&[("calculate_sum", "Add two numbers"), ("divide", "Divide a by b")]);
    request.description = "Arithmetic, now with division".to_string();

    let receipt = registry.service.register(request).await.unwrap();
    assert_eq!(receipt.tool_count, 2);

    let second = registry.store.get("calc").await.unwrap().unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert!(second.last_heartbeat > first.last_heartbeat);
    assert_eq!(second.description, "Arithmetic, now with division");
    assert_eq!(
        second.tool_names().collect::<Vec<_>>(),
        vec!["calculate_sum", "divide"]
    );

    assert!(!registry.index.contains("calc:multiply").await);
    assert!(registry.index.contains("calc:divide").await);
    assert_eq!(registry.index.len().await, 2);

    let hits = registry.index.query("multiply", 5).await.unwrap();
    assert!(hits.iter().all(|hit| hit.metadata.tool_name != "multiply"));
}

#[tokio::test]
async fn test_introspection_failure_writes_nothing() {
    let registry = registry();
    registry.introspector.fail();

    let err = registry.service.register(sample_request()).await.unwrap_err();

    assert!(matches!(err, AppError::Introspection(_)));
    assert_eq!(err.code(), "introspection_failed");
    assert!(registry.store.scan_all().await.unwrap().is_empty());
    assert!(registry.index.is_empty().await);
}

#[tokio::test]
async fn test_failed_reregistration_leaves_previous_record() {
    let registry = registry();
    let mut request = sample_request();
    request.id = Some("calc".to_string());
    registry.service.register(request.clone()).await.unwrap();
    let before = registry.store.get("calc").await.unwrap().unwrap();

    registry.introspector.fail();
    request.name = "Renamed".to_string();
    assert!(registry.service.register(request).await.is_err());

    let after = registry.store.get("calc").await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(registry.index.len().await, 2);
}

#[tokio::test]
async fn test_server_without_tools_is_registered() {
    let registry = registry();
    registry.introspector.set_tools(&[]);

    let receipt = registry.service.register(sample_request()).await.unwrap();

    assert_eq!(receipt.tool_count, 0);
    let record = registry.store.get(&receipt.server_id).await.unwrap().unwrap();
    assert!(record.tools.is_empty());
    assert!(registry.index.is_empty().await);
}

#[tokio::test]
async fn test_invalid_request_never_introspects() {
    let registry = registry();
    let calls = registry.introspector.calls();

    let request = RegisterServerRequest::new("Calculator", "Arithmetic", "ftp://calc.internal");
    let err = registry.service.register(request).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_heartbeat_touches_only_last_heartbeat() {
    let registry = registry();
    let mut request = sample_request();
    request.id = Some("calc".to_string());
    registry.service.register(request).await.unwrap();
    let before = registry.store.get("calc").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let receipt = registry.service.heartbeat("calc").await.unwrap();
    assert_eq!(receipt.server_id, "calc");
    assert_eq!(receipt.status, "heartbeat updated");

    let after = registry.store.get("calc").await.unwrap().unwrap();
    assert!(after.last_heartbeat > before.last_heartbeat);

    let mut expected = before.clone();
    expected.last_heartbeat = after.last_heartbeat;
    assert_eq!(after, expected);
}

#[tokio::test]
async fn test_heartbeat_for_unknown_server() {
    let registry = registry();

    let err = registry.service.heartbeat("ghost").await.unwrap_err();

    assert!(matches!(err, AppError::ServerNotFound(ref id) if id == "ghost"));
    assert!(registry.store.scan_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rebuild_index_from_existing_store() {
    let store: Arc<dyn ServerRepository> = Arc::new(InMemoryServerRepository::new());
    let first = registry_with_store(store.clone());
    let mut request = sample_request();
    request.id = Some("calc".to_string());
    first.service.register(request).await.unwrap();

    // A fresh process: same store, empty index.
    let restarted = registry_with_store(store);
    assert!(restarted.index.is_empty().await);

    let count = restarted.service.rebuild_index().await.unwrap();

    assert_eq!(count, 2);
    let hits = restarted.index.query("add two numbers", 1).await.unwrap();
    assert_eq!(hits[0].id, "calc:calculate_sum");
}

#[tokio::test]
async fn test_register_against_sqlite_store() {
    let pool = create_test_pool().await.unwrap();
    let store = SqliteServerRepository::connect(pool, "servers").await.unwrap();
    let registry = registry_with_store(Arc::new(store));

    let mut request = sample_request();
    request.id = Some("calc".to_string());
    registry.service.register(request.clone()).await.unwrap();
    registry.service.register(request).await.unwrap();
    registry.service.heartbeat("calc").await.unwrap();

    let records = registry.store.scan_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "calc");
    assert_eq!(records[0].tools.len(), 2);
}

#[tokio::test]
async fn test_http_registration_records_fallback_method() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/list_tools"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list_tools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tools": [{
                "name": "get_weather",
                "description": "Current weather for a city",
                "inputSchema": {"type": "object", "properties": {"city": {"type": "string"}}}
            }]
        })))
        .mount(&server)
        .await;

    let store: Arc<dyn ServerRepository> = Arc::new(InMemoryServerRepository::new());
    let index: Arc<dyn SearchIndex> = Arc::new(VectorIndex::new(Arc::new(HashingEmbedder::new())));
    let service = RegistrationService::new(
        store.clone(),
        index,
        Arc::new(EndpointIntrospector::new(Duration::from_secs(5)).unwrap()),
        Duration::from_secs(5),
    );

    let mut request = RegisterServerRequest::new(
        "Weather",
        "Forecasts and current conditions",
        format!("{}/", server.uri()),
    );
    request.id = Some("weather".to_string());
    request.transport = TransportKind::Http;

    let receipt = service.register(request).await.unwrap();
    assert_eq!(receipt.tool_count, 1);

    let record = store.get("weather").await.unwrap().unwrap();
    assert_eq!(record.url, server.uri());
    assert_eq!(record.list_tools_endpoint, "/list_tools");
    assert_eq!(record.list_tools_endpoint_method, HttpMethod::Get);
    assert_eq!(record.tools[0].name, "get_weather");
}

#[tokio::test]
async fn test_index_entries_stay_owned_by_one_server() {
    let registry = registry();

    let mut nested = sample_request();
    nested.id = Some("a:b".to_string());
    let err = registry.service.register(nested).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(registry.store.scan_all().await.unwrap().is_empty());

    registry
        .introspector
        .set_tools(&[("b:c", "Convert celsius temperatures")]);
    let mut first = sample_request();
    first.id = Some("a".to_string());
    registry.service.register(first.clone()).await.unwrap();

    registry
        .introspector
        .set_tools(&[("c", "Convert celsius temperatures")]);
    let mut second = sample_request();
    second.id = Some("a-b".to_string());
    registry.service.register(second).await.unwrap();
    assert_eq!(registry.index.len().await, 2);

    // Dropping the tool from "a" must leave "a-b" searchable.
    registry.introspector.set_tools(&[]);
    registry.service.register(first).await.unwrap();

    assert_eq!(registry.index.len().await, 1);
    assert!(registry.index.contains("a-b:c").await);
    let hits = registry
        .index
        .query("convert celsius temperatures", 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.server_id, "a-b");
}

async fn register_concurrently(store: Arc<dyn ServerRepository>) {
    const SERVERS: usize = 16;

    let registry = registry_with_store(store.clone());
    let service = Arc::new(registry.service);

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..SERVERS {
        let service = service.clone();
        tasks.spawn(async move {
            let mut request = sample_request();
            request.id = Some(format!("server-{:02}", n));
            service.register(request).await
        });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap().unwrap().tool_count, 2);
    }

    let mut heartbeats = tokio::task::JoinSet::new();
    for n in 0..SERVERS {
        let service = service.clone();
        heartbeats.spawn(async move { service.heartbeat(&format!("server-{:02}", n)).await });
    }
    while let Some(result) = heartbeats.join_next().await {
        result.unwrap().unwrap();
    }

    let records = store.scan_all().await.unwrap();
    assert_eq!(records.len(), SERVERS);
    for (n, record) in records.iter().enumerate() {
        assert_eq!(record.id, format!("server-{:02}", n));
        assert_eq!(record.tools.len(), 2);
        assert!(record.last_heartbeat >= record.created_at);
        for tool in ["calculate_sum", "multiply"] {
            assert!(
                registry
                    .index
                    .contains(&SearchDocument::document_id(&record.id, tool))
                    .await
            );
        }
    }
    assert_eq!(registry.index.len().await, SERVERS * 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_in_memory() {
    register_concurrently(Arc::new(InMemoryServerRepository::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_sqlite() {
    let pool = create_test_pool().await.unwrap();
    let store = SqliteServerRepository::connect(pool, "servers").await.unwrap();
    register_concurrently(Arc::new(store)).await;
}
