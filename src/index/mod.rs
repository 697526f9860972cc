//! Search Index over (server, tool) pairs.
//!
//! Documents are keyed `"{server_id}:{tool_name}"` and carry enough
//! metadata to resolve a hit without touching the store. The index is a
//! derived projection: it can be rebuilt from the Registry Store at any time.

pub mod embedder;
pub mod vector_index;

pub use embedder::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use vector_index::VectorIndex;

use crate::models::{SearchDocument, SearchHit};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Embedding provider responded with status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("Embedding has {got} dimensions, index uses {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Search index unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Inserts or replaces documents by id.
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<(), IndexError>;

    /// Removes documents by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), IndexError>;

    /// At most `top_k` hits, best first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError>;
}
