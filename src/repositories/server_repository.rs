use super::{apply_field, ServerRepository, StoreError};
use crate::models::ServerRecord;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

/// The table name is interpolated into SQL, so it must be a bare identifier.
pub fn validate_table_name(table: &str) -> Result<(), StoreError> {
    if TABLE_NAME.is_match(table) {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

/// Registry Store on SQLite.
///
/// Each record is kept whole as a JSON document in one row keyed by id, so
/// arbitrary nested values round-trip unchanged.
pub struct SqliteServerRepository {
    pool: SqlitePool,
    table: String,
}

impl SqliteServerRepository {
    /// Validates the table name and creates the table if needed.
    pub async fn connect(pool: SqlitePool, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY NOT NULL,
                record TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#
        );
        sqlx::query(&create).execute(&pool).await?;

        tracing::debug!(table = %table, "Registry table ready");

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl ServerRepository for SqliteServerRepository {
    async fn put(&self, record: &ServerRecord) -> Result<(), StoreError> {
        let document = serde_json::to_string(record)?;
        let sql = format!(
            r#"
            INSERT INTO {} (id, record, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
            self.table
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(document)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ServerRecord>, StoreError> {
        let sql = format!("SELECT record FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: String = row.try_get("record")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT record FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let document: String = row.try_get("record")?;
        let updated = apply_field(serde_json::from_str(&document)?, field, value)?;

        let update = format!(
            "UPDATE {} SET record = ?, updated_at = ? WHERE id = ?",
            self.table
        );
        sqlx::query(&update)
            .bind(serde_json::to_string(&updated)?)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let sql = format!("SELECT record FROM {} ORDER BY id", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<ServerRecord, StoreError> {
                let document: String = row.try_get("record")?;
                Ok(serde_json::from_str(&document)?)
            })
            .collect()
    }
}
