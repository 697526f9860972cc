use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::index::IndexError;
use crate::mcp::IntrospectionError;
use crate::repositories::StoreError;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the registration and discovery services.
///
/// Every public operation converts its internal failures into one of these
/// variants, so handlers never see a raw transport or driver error.
///
/// | Variant          | Status | Code                     |
/// |------------------|--------|--------------------------|
/// | Validation       | 400    | `invalid_request`        |
/// | Introspection    | 400    | `introspection_failed`   |
/// | ServerNotFound   | 404    | `server_not_found`       |
/// | NoMatchingServer | 404    | `no_matching_server`     |
/// | Store            | 500    | `store_error`            |
/// | Index            | 500    | `index_error`            |
/// | Inconsistent     | 500    | `index_store_divergence` |
/// | Timeout          | 503    | `backend_timeout`        |
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote endpoint could not be reached or did not conform. From the
    /// registry's point of view this is the caller's problem.
    #[error("Introspection failed: {0}")]
    Introspection(#[from] IntrospectionError),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("No matching server for query: {0}")]
    NoMatchingServer(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Search index error: {0}")]
    Index(#[from] IndexError),

    /// The index returned a server id that the store does not know.
    #[error("Search index references server {0} which is missing from the store")]
    Inconsistent(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Introspection(_) => StatusCode::BAD_REQUEST,
            AppError::ServerNotFound(_) | AppError::NoMatchingServer(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Index(_) | AppError::Inconsistent(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "invalid_request",
            AppError::Introspection(_) => "introspection_failed",
            AppError::ServerNotFound(_) => "server_not_found",
            AppError::NoMatchingServer(_) => "no_matching_server",
            AppError::Store(_) => "store_error",
            AppError::Index(_) => "index_error",
            AppError::Inconsistent(_) => "index_store_divergence",
            AppError::Timeout { .. } => "backend_timeout",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = json!({
            "error": self.code(),
            "detail": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
