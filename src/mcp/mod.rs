//! Endpoint introspection
//!
//! Connects to a remote tool server and asks it to enumerate its tools.
//!
//! # Architecture
//!
//! - [`introspection::EndpointIntrospector`] - URL normalization, transport
//!   dispatch, descriptor validation, overall timeout
//! - [`sse_client::SseSession`] - streaming session: `initialize` handshake
//!   then paginated `tools/list`, replies delivered as server-sent events
//! - [`http_client`] - request/response listing with POST then GET fallback
//! - [`sse`] - `text/event-stream` framing
//!
//! Every failure is reported as an [`IntrospectionError`]; callers surface it
//! as a single "introspection failed" error with the cause attached.

pub mod http_client;
pub mod introspection;
pub mod sse;
pub mod sse_client;

pub use introspection::{
    normalize_url, parse_tool_list, EndpointIntrospection, EndpointIntrospector,
    IntrospectionReport, IntrospectionTarget,
};
pub use sse_client::SseSession;

/// Errors that can occur while introspecting a remote endpoint
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Malformed capability payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid capability descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Event stream closed before a response arrived")]
    StreamClosed,
}
