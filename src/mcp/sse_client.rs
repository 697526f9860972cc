//! Streaming introspection session.
//!
//! The remote exposes a long-lived `GET {base}/sse` stream. Its first
//! `endpoint` event names the URL that accepts JSON-RPC messages by POST;
//! replies come back on the stream as `message` events.
//!
//! ```text
//! GET  /sse                    -> event: endpoint / data: /message?sessionId=..
//! POST /message  initialize    -> event: message  / data: {"id":1,"result":{..}}
//! POST /message  notifications/initialized
//! POST /message  tools/list    -> event: message  / data: {"id":2,"result":{"tools":[..]}}
//! ```
//!
//! Dropping the session drops the stream, which closes the connection.

use std::pin::Pin;

use axum::body::Bytes;
use futures::Stream;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use rmcp::model::{Implementation, ProtocolVersion};
use serde_json::{json, Value};

use super::sse::EventStream;
use super::IntrospectionError;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

pub const CLIENT_NAME: &str = "mcp-registry";

/// Upper bound on `tools/list` pages followed through `nextCursor`.
const MAX_PAGES: usize = 100;

pub struct SseSession {
    client: reqwest::Client,
    events: EventStream<ByteStream>,
    message_url: Url,
    next_id: u64,
}

impl SseSession {
    /// Opens the event stream and waits for the message endpoint.
    pub async fn connect(
        client: &reqwest::Client,
        sse_url: &str,
    ) -> Result<Self, IntrospectionError> {
        let stream_url = Url::parse(sse_url)
            .map_err(|e| IntrospectionError::InvalidUrl(format!("{}: {}", sse_url, e)))?;

        let response = client
            .get(stream_url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntrospectionError::Status {
                url: sse_url.to_string(),
                status: status.as_u16(),
            });
        }

        let stream: ByteStream = Box::pin(response.bytes_stream());
        let mut events = EventStream::new(stream);

        let endpoint = loop {
            match events.next_event().await? {
                Some(event) if event.kind() == "endpoint" => break event.data,
                Some(event) => {
                    tracing::debug!(kind = %event.kind(), "Ignoring event before endpoint");
                }
                None => {
                    return Err(IntrospectionError::Handshake(
                        "stream closed before the endpoint event".to_string(),
                    ))
                }
            }
        };

        let message_url = stream_url.join(endpoint.trim()).map_err(|e| {
            IntrospectionError::Handshake(format!("invalid message endpoint {}: {}", endpoint, e))
        })?;

        tracing::debug!(message_url = %message_url, "SSE session established");

        Ok(Self {
            client: client.clone(),
            events,
            message_url,
            next_id: 0,
        })
    }

    /// Protocol handshake: `initialize` followed by the `initialized`
    /// notification. Returns the server's initialize result.
    pub async fn initialize(&mut self) -> Result<Value, IntrospectionError> {
        let client_info = Implementation {
            name: CLIENT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            website_url: None,
            icons: None,
        };

        let params = json!({
            "protocolVersion": ProtocolVersion::default(),
            "capabilities": {},
            "clientInfo": client_info,
        });

        let result = self
            .request("initialize", params)
            .await
            .map_err(|e| match e {
                IntrospectionError::Remote { .. } | IntrospectionError::Protocol(_) => {
                    IntrospectionError::Handshake(e.to_string())
                }
                other => other,
            })?;

        self.notify("notifications/initialized").await?;

        Ok(result)
    }

    /// Lists every tool, following `nextCursor` pagination.
    pub async fn list_tools(&mut self) -> Result<Vec<Value>, IntrospectionError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };

            let result = self.request("tools/list", params).await?;
            let page = result
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    IntrospectionError::MalformedPayload(
                        "tools/list result has no tools list".to_string(),
                    )
                })?;
            tools.extend(page.iter().cloned());

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(tools);
            }
        }

        Err(IntrospectionError::Protocol(format!(
            "tools/list did not finish within {} pages",
            MAX_PAGES
        )))
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, IntrospectionError> {
        self.next_id += 1;
        let id = self.next_id;

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.message_url.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntrospectionError::Status {
                url: self.message_url.to_string(),
                status: status.as_u16(),
            });
        }

        // Some servers answer inline instead of on the stream.
        let inline_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if inline_json {
            let body: Value = response.json().await?;
            if is_response_to(&body, id) {
                return into_result(body);
            }
        }

        loop {
            let event = self
                .events
                .next_event()
                .await?
                .ok_or(IntrospectionError::StreamClosed)?;

            if event.kind() != "message" {
                continue;
            }

            let reply: Value = match serde_json::from_str(&event.data) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping non-JSON event");
                    continue;
                }
            };

            if is_response_to(&reply, id) {
                return into_result(reply);
            }
        }
    }

    async fn notify(&mut self, method: &str) -> Result<(), IntrospectionError> {
        let message = json!({
            "jsonrpc": "2.0",
            "method": method,
        });

        let response = self
            .client
            .post(self.message_url.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntrospectionError::Status {
                url: self.message_url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

/// Runs handshake and listing in one session. The session is dropped on
/// every return path.
pub async fn list_tools_over_sse(
    client: &reqwest::Client,
    sse_url: &str,
) -> Result<Vec<Value>, IntrospectionError> {
    let mut session = SseSession::connect(client, sse_url).await?;
    session.initialize().await?;
    session.list_tools().await
}

fn is_response_to(message: &Value, id: u64) -> bool {
    message.get("id").and_then(Value::as_u64) == Some(id)
        && (message.get("result").is_some() || message.get("error").is_some())
}

fn into_result(mut message: Value) -> Result<Value, IntrospectionError> {
    if let Some(error) = message.get("error") {
        return Err(IntrospectionError::Remote {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    message
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| IntrospectionError::Protocol("reply has no result".to_string()))
}
