pub mod memory_repository;
pub mod server_repository;

pub use memory_repository::InMemoryServerRepository;
pub use server_repository::{validate_table_name, SqliteServerRepository};

use crate::models::ServerRecord;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Errors raised by a Registry Store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No record with id {0}")]
    NotFound(String),

    #[error("Field cannot be updated: {0}")]
    InvalidField(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable keyed storage for server records.
///
/// Implementations must be safe to share across concurrent requests; writes
/// to different ids never interfere. Two writes to the same id resolve as
/// last write wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// Upsert keyed by `record.id`.
    async fn put(&self, record: &ServerRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ServerRecord>, StoreError>;

    /// Sets one top-level field of an existing record.
    ///
    /// Fails with [`StoreError::NotFound`] when the id is unknown and with
    /// [`StoreError::InvalidField`] for immutable or unknown fields.
    async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError>;

    /// Every record, ordered by id.
    async fn scan_all(&self) -> Result<Vec<ServerRecord>, StoreError>;
}

static FIELD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap());

/// Shared `update_field` guard: the name must be a plain identifier and not
/// one of the fields fixed at first registration.
pub(crate) fn check_updatable_field(field: &str) -> Result<(), StoreError> {
    if !FIELD_NAME.is_match(field) {
        return Err(StoreError::InvalidField(field.to_string()));
    }
    if ServerRecord::IMMUTABLE_FIELDS.contains(&field) {
        return Err(StoreError::InvalidField(format!("{} is immutable", field)));
    }
    Ok(())
}

/// Replaces one field of a stored record document.
///
/// The field must already exist and the result must still decode as a
/// [`ServerRecord`], so a bad value never reaches storage.
pub(crate) fn apply_field(mut document: Value, field: &str, value: Value) -> Result<Value, StoreError> {
    check_updatable_field(field)?;

    let slot = document
        .as_object_mut()
        .and_then(|object| object.get_mut(field))
        .ok_or_else(|| StoreError::InvalidField(format!("unknown field {}", field)))?;
    *slot = value;

    serde_json::from_value::<ServerRecord>(document.clone())
        .map_err(|e| StoreError::InvalidField(format!("{}: {}", field, e)))?;

    Ok(document)
}
