use crate::error::AppError;
use crate::models::search::DOCUMENT_ID_SEPARATOR;
use crate::models::tool::{PromptDescriptor, ResourceDescriptor, ToolDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_SSE_ENDPOINT: &str = "/sse";
pub const DEFAULT_LIST_TOOLS_ENDPOINT: &str = "/list_tools";
pub const DEFAULT_CALL_TOOL_ENDPOINT: &str = "/call_tool";

/// How the registry talks to a remote endpoint during introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Streaming session: handshake, then `tools/list`, over server-sent events.
    #[default]
    Sse,
    /// Plain request/response listing with POST then GET fallback.
    Http,
}

impl TransportKind {
    pub fn default_list_endpoint(self) -> &'static str {
        match self {
            TransportKind::Sse => DEFAULT_SSE_ENDPOINT,
            TransportKind::Http => DEFAULT_LIST_TOOLS_ENDPOINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Get,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Get => "GET",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Get => reqwest::Method::GET,
        }
    }
}

/// The registry's durable entry for one registered endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub prompts: Vec<PromptDescriptor>,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub list_tools_endpoint: String,
    pub call_tool_endpoint: String,
    #[serde(default)]
    pub list_tools_endpoint_method: HttpMethod,
    #[serde(default)]
    pub call_endpoint_method: HttpMethod,
}

impl ServerRecord {
    /// Fields that `update_field` refuses to touch.
    pub const IMMUTABLE_FIELDS: [&'static str; 2] = ["id", "created_at"];

    /// Builds the record written by a registration.
    ///
    /// Everything the caller supplied is taken from `request`; the tool
    /// snapshot, canonical URL, listing method and timestamps come from
    /// `overrides`. When a `previous` record exists for the same id its
    /// `created_at` is kept, everything else is replaced.
    pub fn from_registration(
        request: RegisterServerRequest,
        overrides: RegistrationOverrides,
        previous: Option<&ServerRecord>,
    ) -> Self {
        let created_at = previous
            .map(|record| record.created_at)
            .unwrap_or(overrides.now);
        let list_tools_endpoint = request.list_tools_endpoint();
        let tags = dedupe_tags(request.tags);

        Self {
            id: overrides.id,
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            tags,
            url: overrides.base_url,
            transport: request.transport,
            tools: overrides.tools,
            resources: request.resources,
            prompts: request.prompts,
            created_at,
            last_heartbeat: overrides.now,
            list_tools_endpoint,
            call_tool_endpoint: request
                .call_tool_endpoint
                .unwrap_or_else(|| DEFAULT_CALL_TOOL_ENDPOINT.to_string()),
            list_tools_endpoint_method: overrides.list_method,
            call_endpoint_method: request.call_endpoint_method.unwrap_or_default(),
        }
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }
}

/// Server-assigned values merged into a registration payload.
#[derive(Debug, Clone)]
pub struct RegistrationOverrides {
    pub id: String,
    pub base_url: String,
    pub tools: Vec<ToolDescriptor>,
    pub list_method: HttpMethod,
    pub now: DateTime<Utc>,
}

/// Payload accepted by `POST /register_server`.
///
/// `tools`, `created_at` and `last_heartbeat` are server-assigned; if a
/// caller sends them they are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterServerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub prompts: Vec<PromptDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_tools_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_tool_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_tools_endpoint_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_endpoint_method: Option<HttpMethod>,
}

impl RegisterServerRequest {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            url: url.into(),
            transport: TransportKind::default(),
            resources: Vec::new(),
            prompts: Vec::new(),
            list_tools_endpoint: None,
            call_tool_endpoint: None,
            list_tools_endpoint_method: None,
            call_endpoint_method: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::Validation(
                "description must not be empty".to_string(),
            ));
        }

        if let Some(id) = self.id.as_deref() {
            if id.contains(DOCUMENT_ID_SEPARATOR) {
                return Err(AppError::Validation(format!(
                    "id must not contain '{}'",
                    DOCUMENT_ID_SEPARATOR
                )));
            }
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("url must not be empty".to_string()));
        }
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("url is not valid: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "url scheme must be http or https, got {}",
                parsed.scheme()
            )));
        }

        for (field, path) in [
            ("list_tools_endpoint", &self.list_tools_endpoint),
            ("call_tool_endpoint", &self.call_tool_endpoint),
        ] {
            if let Some(path) = path {
                if !path.starts_with('/') {
                    return Err(AppError::Validation(format!(
                        "{} must start with '/'",
                        field
                    )));
                }
            }
        }

        Ok(())
    }

    /// Caller-supplied id, or a fresh one when absent or blank.
    pub fn resolve_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        }
    }

    pub fn list_tools_endpoint(&self) -> String {
        self.list_tools_endpoint
            .clone()
            .unwrap_or_else(|| self.transport.default_list_endpoint().to_string())
    }

    /// Where and how introspection should reach the endpoint.
    pub fn endpoint(&self) -> EndpointSpec {
        EndpointSpec {
            transport: self.transport,
            url: self.url.trim().to_string(),
            list_tools_endpoint: self.list_tools_endpoint(),
            list_method: self.list_tools_endpoint_method.unwrap_or_default(),
        }
    }
}

/// Input to the introspection client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub transport: TransportKind,
    pub url: String,
    pub list_tools_endpoint: String,
    pub list_method: HttpMethod,
}

impl EndpointSpec {
    pub fn sse(url: impl Into<String>) -> Self {
        Self {
            transport: TransportKind::Sse,
            url: url.into(),
            list_tools_endpoint: DEFAULT_SSE_ENDPOINT.to_string(),
            list_method: HttpMethod::Post,
        }
    }

    pub fn http(url: impl Into<String>, list_tools_endpoint: impl Into<String>) -> Self {
        Self {
            transport: TransportKind::Http,
            url: url.into(),
            list_tools_endpoint: list_tools_endpoint.into(),
            list_method: HttpMethod::Post,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub server_id: String,
    pub status: String,
    pub tool_count: usize,
}

impl RegistrationReceipt {
    pub fn registered(server_id: String, tool_count: usize) -> Self {
        Self {
            server_id,
            status: "registered".to_string(),
            tool_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatReceipt {
    pub server_id: String,
    pub status: String,
}

impl HeartbeatReceipt {
    pub fn updated(server_id: String) -> Self {
        Self {
            server_id,
            status: "heartbeat updated".to_string(),
        }
    }
}

fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !unique.iter().any(|existing| existing == tag) {
            unique.push(tag.to_string());
        }
    }
    unique
}
