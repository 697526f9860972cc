use crate::models::server::ServerRecord;
use serde::{Deserialize, Serialize};

/// Metadata carried by every index document, enough to resolve a hit back
/// to its server without touching the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub server_id: String,
    pub server_name: String,
    pub server_description: String,
    pub tool_name: String,
    pub tool_description: String,
}

/// One (server, capability) pair as stored in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub text: String,
    pub metadata: ToolMetadata,
}

/// Joins server id and tool name in index ids. Server ids never contain it,
/// so an id splits back into exactly one (server, tool) pair.
pub const DOCUMENT_ID_SEPARATOR: char = ':';

impl SearchDocument {
    pub fn document_id(server_id: &str, tool_name: &str) -> String {
        format!("{}{}{}", server_id, DOCUMENT_ID_SEPARATOR, tool_name)
    }

    /// Projects a server record into one document per capability.
    pub fn for_record(record: &ServerRecord) -> Vec<SearchDocument> {
        record
            .tools
            .iter()
            .map(|tool| SearchDocument {
                id: Self::document_id(&record.id, &tool.name),
                text: format!(
                    "{} {} {} {}",
                    record.name, record.description, tool.name, tool.description
                ),
                metadata: ToolMetadata {
                    server_id: record.id.clone(),
                    server_name: record.name.clone(),
                    server_description: record.description.clone(),
                    tool_name: tool.name.clone(),
                    tool_description: tool.description.clone(),
                },
            })
            .collect()
    }

    /// Ids present for `previous` but gone from `current`.
    pub fn stale_ids(previous: &ServerRecord, current: &ServerRecord) -> Vec<String> {
        previous
            .tool_names()
            .filter(|name| !current.tool_names().any(|kept| kept == *name))
            .map(|name| Self::document_id(&previous.id, name))
            .collect()
    }
}

/// Raw ranked hit returned by a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub metadata: ToolMetadata,
    pub score: f32,
}

/// Ranked capability returned by `POST /search_tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMatch {
    #[serde(flatten)]
    pub metadata: ToolMetadata,
    pub score: f32,
}

impl From<SearchHit> for ToolMatch {
    fn from(hit: SearchHit) -> Self {
        Self {
            metadata: hit.metadata,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
        }
    }
}

/// Best-match discovery result: the winning capability and its server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredServer {
    pub matched_tool: ToolMatch,
    pub server: ServerRecord,
}
