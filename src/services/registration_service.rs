use super::{bounded, with_timeout};
use crate::error::{AppError, Result};
use crate::index::SearchIndex;
use crate::mcp::EndpointIntrospection;
use crate::models::{
    HeartbeatReceipt, RegisterServerRequest, RegistrationOverrides, RegistrationReceipt,
    SearchDocument, ServerRecord,
};
use crate::repositories::{ServerRepository, StoreError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Turns a registration payload plus live introspection into a stored,
/// indexed server record.
///
/// Steps run in order and the first failure stops the rest: nothing is
/// written when introspection fails, and the index is only touched after
/// the store write succeeded.
pub struct RegistrationService {
    store: Arc<dyn ServerRepository>,
    index: Arc<dyn SearchIndex>,
    introspector: Arc<dyn EndpointIntrospection>,
    backend_timeout: Duration,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn ServerRepository>,
        index: Arc<dyn SearchIndex>,
        introspector: Arc<dyn EndpointIntrospection>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            store,
            index,
            introspector,
            backend_timeout,
        }
    }

    pub async fn register(&self, request: RegisterServerRequest) -> Result<RegistrationReceipt> {
        request.validate()?;

        let server_id = request.resolve_id();
        let now = Utc::now();
        let endpoint = request.endpoint();

        let report = self.introspector.introspect(&endpoint).await.map_err(|e| {
            tracing::warn!(
                server_id = %server_id,
                url = %endpoint.url,
                error = %e,
                "Introspection failed"
            );
            AppError::Introspection(e)
        })?;

        tracing::debug!(
            server_id = %server_id,
            base_url = %report.base_url,
            introspection_url = %report.introspection_url,
            tool_count = report.tools.len(),
            "Endpoint introspected"
        );

        let previous = bounded("store get", self.backend_timeout, self.store.get(&server_id)).await?;

        let record = ServerRecord::from_registration(
            request,
            RegistrationOverrides {
                id: server_id,
                base_url: report.base_url,
                tools: report.tools,
                list_method: report.list_method,
                now,
            },
            previous.as_ref(),
        );

        bounded("store put", self.backend_timeout, self.store.put(&record)).await?;

        if let Some(previous) = &previous {
            let stale = SearchDocument::stale_ids(previous, &record);
            if !stale.is_empty() {
                tracing::debug!(server_id = %record.id, stale = ?stale, "Pruning removed tools");
                bounded("index delete", self.backend_timeout, self.index.delete(&stale)).await?;
            }
        }

        bounded(
            "index upsert",
            self.backend_timeout,
            self.index.upsert(SearchDocument::for_record(&record)),
        )
        .await?;

        tracing::info!(
            server_id = %record.id,
            name = %record.name,
            tool_count = record.tools.len(),
            reregistration = previous.is_some(),
            "Server registered"
        );

        Ok(RegistrationReceipt::registered(record.id, record.tools.len()))
    }

    /// Sets `last_heartbeat` to now and nothing else.
    pub async fn heartbeat(&self, server_id: &str) -> Result<HeartbeatReceipt> {
        let server_id = server_id.trim();
        if server_id.is_empty() {
            return Err(AppError::Validation("server_id must not be empty".to_string()));
        }

        let update = self
            .store
            .update_field(server_id, "last_heartbeat", json!(Utc::now()));

        match with_timeout("store update_field", self.backend_timeout, update).await? {
            Ok(()) => {
                tracing::debug!(server_id = %server_id, "Heartbeat recorded");
                Ok(HeartbeatReceipt::updated(server_id.to_string()))
            }
            Err(StoreError::NotFound(id)) => Err(AppError::ServerNotFound(id)),
            Err(e) => {
                tracing::error!(server_id = %server_id, error = %e, "Heartbeat update failed");
                Err(e.into())
            }
        }
    }

    /// Re-indexes every stored record. Returns the number of documents written.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let records = bounded("store scan_all", self.backend_timeout, self.store.scan_all()).await?;

        let documents: Vec<SearchDocument> =
            records.iter().flat_map(SearchDocument::for_record).collect();
        let count = documents.len();

        bounded("index upsert", self.backend_timeout, self.index.upsert(documents)).await?;

        tracing::info!(
            servers = records.len(),
            documents = count,
            "Search index rebuilt from store"
        );
        Ok(count)
    }
}
