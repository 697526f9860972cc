use super::{apply_field, ServerRepository, StoreError};
use crate::models::ServerRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local Registry Store for development runs and tests.
///
/// Records are held as JSON documents, the same shape the SQLite store
/// persists, so `update_field` behaves identically on both.
#[derive(Default)]
pub struct InMemoryServerRepository {
    records: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryServerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ServerRepository for InMemoryServerRepository {
    async fn put(&self, record: &ServerRecord) -> Result<(), StoreError> {
        let document = serde_json::to_value(record)?;
        self.records
            .write()
            .await
            .insert(record.id.clone(), document);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ServerRecord>, StoreError> {
        let records = self.records.read().await;
        match records.get(id) {
            Some(document) => Ok(Some(serde_json::from_value(document.clone())?)),
            None => Ok(None),
        }
    }

    async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let current = records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let updated = apply_field(current, field, value)?;
        records.insert(id.to_string(), updated);
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let records = self.records.read().await;
        records
            .values()
            .map(|document| serde_json::from_value(document.clone()).map_err(StoreError::from))
            .collect()
    }
}
