use super::{Embedder, IndexError, SearchIndex};
use crate::models::{SearchDocument, SearchHit, ToolMetadata};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct IndexedDocument {
    vector: Vec<f32>,
    metadata: ToolMetadata,
}

/// In-process vector index ranked by cosine similarity.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    min_score: f32,
    documents: RwLock<HashMap<String, IndexedDocument>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            min_score: 0.0,
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Hits scoring at or below `min_score` are dropped.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.documents.read().await.contains_key(id)
    }

    /// Every stored and query vector must match the embedder's width.
    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for VectorIndex {
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<(), IndexError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(IndexError::CountMismatch {
                expected: documents.len(),
                got: vectors.len(),
            });
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }

        let mut index = self.documents.write().await;
        for (doc, vector) in documents.into_iter().zip(vectors) {
            index.insert(
                doc.id,
                IndexedDocument {
                    vector,
                    metadata: doc.metadata,
                },
            );
        }

        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        let mut index = self.documents.write().await;
        for id in ids {
            index.remove(id);
        }
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(IndexError::CountMismatch {
                expected: 1,
                got: 0,
            })?;
        self.check_dimensions(&query)?;

        let index = self.documents.read().await;
        let mut hits: Vec<SearchHit> = index
            .iter()
            .map(|(id, doc)| SearchHit {
                id: id.clone(),
                metadata: doc.metadata.clone(),
                score: cosine_similarity(&query, &doc.vector),
            })
            .filter(|hit| hit.score > self.min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

/// Cosine similarity; zero when either vector is zero or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
