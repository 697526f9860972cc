use super::bounded;
use crate::error::{AppError, Result};
use crate::index::SearchIndex;
use crate::models::{DiscoveredServer, SearchRequest, ServerRecord, ToolMatch};
use crate::repositories::ServerRepository;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 50;

pub struct DiscoveryService {
    store: Arc<dyn ServerRepository>,
    index: Arc<dyn SearchIndex>,
    default_top_k: usize,
    backend_timeout: Duration,
}

impl DiscoveryService {
    pub fn new(
        store: Arc<dyn ServerRepository>,
        index: Arc<dyn SearchIndex>,
        default_top_k: usize,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            store,
            index,
            default_top_k: default_top_k.clamp(1, MAX_TOP_K),
            backend_timeout,
        }
    }

    /// Ranked tool matches, best first. No hits is an empty list.
    pub async fn search_tools(&self, request: &SearchRequest) -> Result<Vec<ToolMatch>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query must not be empty".to_string()));
        }
        let top_k = self.resolve_top_k(request.top_k)?;

        let hits = bounded("index query", self.backend_timeout, self.index.query(query, top_k)).await?;

        tracing::debug!(query = %query, top_k, hits = hits.len(), "Tool search");

        Ok(hits.into_iter().map(ToolMatch::from).collect())
    }

    /// Resolves the first-ranked hit to its full server record.
    pub async fn find_best_server(&self, request: &SearchRequest) -> Result<DiscoveredServer> {
        let matched_tool = self
            .search_tools(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NoMatchingServer(request.query.trim().to_string()))?;

        let server_id = matched_tool.metadata.server_id.clone();
        let server = bounded("store get", self.backend_timeout, self.store.get(&server_id))
            .await?
            .ok_or_else(|| {
                tracing::error!(
                    server_id = %server_id,
                    tool_name = %matched_tool.metadata.tool_name,
                    "Index hit has no store record"
                );
                AppError::Inconsistent(server_id.clone())
            })?;

        Ok(DiscoveredServer {
            matched_tool,
            server,
        })
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>> {
        bounded("store scan_all", self.backend_timeout, self.store.scan_all()).await
    }

    pub async fn get_server(&self, id: &str) -> Result<ServerRecord> {
        bounded("store get", self.backend_timeout, self.store.get(id))
            .await?
            .ok_or_else(|| AppError::ServerNotFound(id.to_string()))
    }

    fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_top_k),
            Some(k) if (1..=MAX_TOP_K).contains(&k) => Ok(k),
            Some(k) => Err(AppError::Validation(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, k
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexError, MockSearchIndex};
    use crate::models::{SearchHit, ToolMetadata};
    use crate::repositories::{MockServerRepository, StoreError};
    use crate::test_utils::test_helpers::sample_record;

    fn hit(server_id: &str, tool: &str, score: f32) -> SearchHit {
        SearchHit {
            id: format!("{}:{}", server_id, tool),
            metadata: ToolMetadata {
                server_id: server_id.to_string(),
                server_name: "Calculator".to_string(),
                server_description: "Arithmetic".to_string(),
                tool_name: tool.to_string(),
                tool_description: String::new(),
            },
            score,
        }
    }

    fn service(store: MockServerRepository, index: MockSearchIndex) -> DiscoveryService {
        DiscoveryService::new(
            Arc::new(store),
            Arc::new(index),
            DEFAULT_TOP_K,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_search_uses_default_top_k() {
        let mut index = MockSearchIndex::new();
        index
            .expect_query()
            .withf(|text, top_k| text == "add two numbers" && *top_k == DEFAULT_TOP_K)
            .returning(|_, _| Ok(vec![hit("calc", "calculate_sum", 0.9)]));

        let matches = service(MockServerRepository::new(), index)
            .search_tools(&SearchRequest::new("  add two numbers "))
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.tool_name, "calculate_sum");
    }

    #[tokio::test]
    async fn test_search_rejects_bad_input() {
        let service = service(MockServerRepository::new(), MockSearchIndex::new());

        let err = service.search_tools(&SearchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut request = SearchRequest::new("sum");
        request.top_k = Some(MAX_TOP_K + 1);
        let err = service.search_tools(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_index_failure_is_server_error() {
        let mut index = MockSearchIndex::new();
        index
            .expect_query()
            .returning(|_, _| Err(IndexError::Unavailable("embedding backend down".into())));

        let err = service(MockServerRepository::new(), index)
            .search_tools(&SearchRequest::new("sum"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Index(_)));
        assert!(err.to_string().contains("embedding backend down"));
    }

    #[tokio::test]
    async fn test_best_match_resolves_first_hit() {
        let mut index = MockSearchIndex::new();
        index.expect_query().returning(|_, _| {
            Ok(vec![
                hit("calc", "calculate_sum", 0.9),
                hit("other", "sum_all", 0.4),
            ])
        });

        let mut store = MockServerRepository::new();
        store
            .expect_get()
            .withf(|id| id == "calc")
            .times(1)
            .returning(|id| Ok(Some(sample_record(id, &["calculate_sum"]))));

        let found = service(store, index)
            .find_best_server(&SearchRequest::new("add"))
            .await
            .unwrap();

        assert_eq!(found.server.id, "calc");
        assert_eq!(found.matched_tool.metadata.tool_name, "calculate_sum");
    }

    #[tokio::test]
    async fn test_best_match_without_hits() {
        let mut index = MockSearchIndex::new();
        index.expect_query().returning(|_, _| Ok(vec![]));

        let err = service(MockServerRepository::new(), index)
            .find_best_server(&SearchRequest::new("teleport"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoMatchingServer(q) if q == "teleport"));
    }

    #[tokio::test]
    async fn test_best_match_reports_divergence() {
        let mut index = MockSearchIndex::new();
        index
            .expect_query()
            .returning(|_, _| Ok(vec![hit("gone", "calculate_sum", 0.9)]));

        let mut store = MockServerRepository::new();
        store.expect_get().returning(|_| Ok(None));

        let err = service(store, index)
            .find_best_server(&SearchRequest::new("add"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Inconsistent(id) if id == "gone"));
    }

    #[tokio::test]
    async fn test_best_match_store_failure() {
        let mut index = MockSearchIndex::new();
        index
            .expect_query()
            .returning(|_, _| Ok(vec![hit("calc", "calculate_sum", 0.9)]));

        let mut store = MockServerRepository::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("disk I/O error".into())));

        let err = service(store, index)
            .find_best_server(&SearchRequest::new("add"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
