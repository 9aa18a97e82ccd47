//! SQLite stand-in for the remote collection store.
//!
//! Documents are stored as JSON text keyed by their full path; the parent
//! path is denormalized so child listing is a single indexed lookup.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::store::{paths, DocumentStore};

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, AppError> {
        let row = sqlx::query("SELECT body FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, path: &str, doc: &Value) -> Result<(), AppError> {
        let (parent, doc_id) = paths::split(path);
        let body = serde_json::to_string(doc)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO documents (path, parent, doc_id, body, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(path) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(path)
        .bind(parent)
        .bind(doc_id)
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM documents WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, collection_path: &str) -> Result<Vec<(String, Value)>, AppError> {
        let rows = sqlx::query("SELECT doc_id, body FROM documents WHERE parent = ? ORDER BY doc_id")
            .bind(collection_path)
            .fetch_all(&self.pool)
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let doc_id: String = row.get("doc_id");
            let body: String = row.get("body");
            // Unparseable bodies surface as null so callers can drop them per record
            let value = serde_json::from_str(&body).unwrap_or(Value::Null);
            docs.push((doc_id, value));
        }
        Ok(docs)
    }
}
