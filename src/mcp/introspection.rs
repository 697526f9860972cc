use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{http_client, sse_client, IntrospectionError};
use crate::models::{EndpointSpec, HttpMethod, ToolDescriptor, TransportKind};

/// Canonical base URL to persist and the URL actually contacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectionTarget {
    pub base_url: String,
    pub introspection_url: String,
}

/// Strips trailing slashes, then splits `url` into base and introspection
/// URL around the well-known `suffix`.
///
/// `http://h/sse` and `http://h/` both give base `http://h` and
/// introspection URL `http://h/sse` for the suffix `/sse`.
pub fn normalize_url(url: &str, suffix: &str) -> IntrospectionTarget {
    let url = url.trim().trim_end_matches('/');
    let suffix = suffix.trim_end_matches('/');

    if suffix.is_empty() {
        return IntrospectionTarget {
            base_url: url.to_string(),
            introspection_url: url.to_string(),
        };
    }

    match url.strip_suffix(suffix) {
        Some(base) if !base.is_empty() => IntrospectionTarget {
            base_url: base.to_string(),
            introspection_url: url.to_string(),
        },
        _ => IntrospectionTarget {
            base_url: url.to_string(),
            introspection_url: format!("{}{}", url, suffix),
        },
    }
}

/// Validated result of introspecting one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectionReport {
    pub base_url: String,
    pub introspection_url: String,
    pub tools: Vec<ToolDescriptor>,
    /// Method that successfully listed the tools.
    pub list_method: HttpMethod,
}

#[async_trait]
pub trait EndpointIntrospection: Send + Sync {
    async fn introspect(
        &self,
        endpoint: &EndpointSpec,
    ) -> Result<IntrospectionReport, IntrospectionError>;
}

/// Introspection client backed by `reqwest`.
///
/// The whole exchange (connect, handshake, listing, fallback retry) is bounded
/// by one timeout.
#[derive(Clone)]
pub struct EndpointIntrospector {
    client: reqwest::Client,
    timeout: Duration,
}

impl EndpointIntrospector {
    pub fn new(timeout: Duration) -> Result<Self, IntrospectionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    async fn fetch(
        &self,
        endpoint: &EndpointSpec,
        target: &IntrospectionTarget,
    ) -> Result<(Value, HttpMethod), IntrospectionError> {
        match endpoint.transport {
            TransportKind::Sse => {
                let tools =
                    sse_client::list_tools_over_sse(&self.client, &target.introspection_url)
                        .await?;
                Ok((Value::Array(tools), endpoint.list_method))
            }
            TransportKind::Http => {
                http_client::list_tools_over_http(
                    &self.client,
                    &target.introspection_url,
                    endpoint.list_method,
                )
                .await
            }
        }
    }
}

#[async_trait]
impl EndpointIntrospection for EndpointIntrospector {
    async fn introspect(
        &self,
        endpoint: &EndpointSpec,
    ) -> Result<IntrospectionReport, IntrospectionError> {
        let target = normalize_url(&endpoint.url, &endpoint.list_tools_endpoint);
        Url::parse(&target.introspection_url).map_err(|e| {
            IntrospectionError::InvalidUrl(format!("{}: {}", target.introspection_url, e))
        })?;

        tracing::debug!(
            base_url = %target.base_url,
            introspection_url = %target.introspection_url,
            transport = ?endpoint.transport,
            "Introspecting endpoint"
        );

        let (payload, list_method) = tokio::time::timeout(self.timeout, self.fetch(endpoint, &target))
            .await
            .map_err(|_| IntrospectionError::Timeout(self.timeout.as_millis() as u64))??;

        let tools = parse_tool_list(payload)?;

        Ok(IntrospectionReport {
            base_url: target.base_url,
            introspection_url: target.introspection_url,
            tools,
            list_method,
        })
    }
}

/// Validates a capability payload.
///
/// Accepts a list of descriptors or an object with a `tools` list. Every
/// entry must be a well-formed descriptor with a non-empty, unique name;
/// one bad entry rejects the whole payload.
pub fn parse_tool_list(payload: Value) -> Result<Vec<ToolDescriptor>, IntrospectionError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("tools") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(IntrospectionError::MalformedPayload(format!(
                    "tools field must be a list, got {}",
                    value_kind(&other)
                )))
            }
            None => {
                return Err(IntrospectionError::MalformedPayload(
                    "object has no tools field".to_string(),
                ))
            }
        },
        other => {
            return Err(IntrospectionError::MalformedPayload(format!(
                "expected a list or an object with a tools list, got {}",
                value_kind(&other)
            )))
        }
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut tools = Vec::with_capacity(items.len());

    for (position, item) in items.into_iter().enumerate() {
        let descriptor = parse_descriptor(item).map_err(|e| {
            IntrospectionError::InvalidDescriptor(format!("entry {}: {}", position, e))
        })?;

        if descriptor.name.trim().is_empty() {
            return Err(IntrospectionError::InvalidDescriptor(format!(
                "entry {}: name must not be empty",
                position
            )));
        }
        if !seen.insert(descriptor.name.clone()) {
            return Err(IntrospectionError::InvalidDescriptor(format!(
                "duplicate tool name {}",
                descriptor.name
            )));
        }

        tools.push(descriptor);
    }

    Ok(tools)
}

/// MCP wire shape first, then the registry's own snake_case shape.
fn parse_descriptor(item: Value) -> Result<ToolDescriptor, serde_json::Error> {
    match serde_json::from_value::<rmcp::model::Tool>(item.clone()) {
        Ok(tool) => Ok(ToolDescriptor::from(tool)),
        Err(wire_error) => serde_json::from_value::<ToolDescriptor>(item).map_err(|_| wire_error),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
