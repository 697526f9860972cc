use crate::error::{AppError, Result};
use crate::models::{
    DiscoveredServer, HeartbeatReceipt, RegisterServerRequest, RegistrationReceipt, SearchRequest,
    ServerRecord, ToolMatch,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Liveness only; never checks dependencies.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register_server_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterServerRequest>,
) -> Result<Json<RegistrationReceipt>> {
    let receipt = state.registration_service.register(request).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatParams {
    pub server_id: Option<String>,
}

/// `server_id` comes from the query string, or else from a JSON body.
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Query(params): Query<HeartbeatParams>,
    body: Bytes,
) -> Result<Json<HeartbeatReceipt>> {
    let server_id = match params.server_id {
        Some(server_id) => server_id,
        None => server_id_from_body(&body)?,
    };

    let receipt = state.registration_service.heartbeat(&server_id).await?;
    Ok(Json(receipt))
}

fn server_id_from_body(body: &[u8]) -> Result<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation(
            "server_id is required as a query parameter or body field".to_string(),
        ));
    }

    let params: HeartbeatParams = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("invalid heartbeat body: {}", e)))?;

    params.server_id.ok_or_else(|| {
        AppError::Validation("server_id is required as a query parameter or body field".to_string())
    })
}

pub async fn search_tools_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<ToolMatch>>> {
    let matches = state.discovery_service.search_tools(&request).await?;
    Ok(Json(matches))
}

pub async fn find_server_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<DiscoveredServer>> {
    let found = state.discovery_service.find_best_server(&request).await?;
    Ok(Json(found))
}

pub async fn list_servers_handler(State(state): State<AppState>) -> Result<Json<Vec<ServerRecord>>> {
    let servers = state.discovery_service.list_servers().await?;
    Ok(Json(servers))
}

pub async fn get_server_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerRecord>> {
    let server = state.discovery_service.get_server(&id).await?;
    Ok(Json(server))
}
