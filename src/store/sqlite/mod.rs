#[cfg(test)]
mod tests;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{Document, DocumentSource, DocumentStatus, NewDocument, SearchHit};
use super::{VectorStore, WRITE_BATCH_PAUSE, WRITE_BATCH_SIZE, rank_hits};
use crate::chunker::TextChunk;
use crate::embeddings::{Embedding, cosine_similarity};
use crate::{DocqaError, Result};

const DOCUMENT_COLUMNS: &str =
    "id, title, source, url, size, status, chunk_count, created_at, updated_at";

/// SQLite-backed implementation of the store contract.
///
/// Document metadata and chunk rows live in two tables; vectors are stored
/// as little-endian f32 BLOBs next to their chunks and scanned brute-force
/// at query time. The pool may be shared read-mostly across queries.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
}

impl SqliteVectorStore {
    #[inline]
    pub async fn new<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| DocqaError::Storage(format!("failed to open database: {}", e)))?;

        let store = Self { pool, dimension };
        store.init_schema().await?;

        info!("sqlite vector store ready ({} dimensions)", dimension);
        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                url TEXT,
                content TEXT NOT NULL DEFAULT '',
                size INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                chunk_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        debug!("sqlite schema initialized");
        Ok(())
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            return Err(DocqaError::DimensionMismatch {
                expected: self.dimension,
                got: len,
            });
        }
        Ok(())
    }

    fn serialize_vector(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn hit_from_row(row: &SqliteRow, similarity: f32) -> SearchHit {
        let metadata: String = row.get("metadata");
        let page = serde_json::from_str::<serde_json::Value>(&metadata)
            .ok()
            .and_then(|m| m.get("page").and_then(serde_json::Value::as_u64))
            .and_then(|p| u32::try_from(p).ok());

        SearchHit {
            document_id: row.get("document_id"),
            chunk_index: row.get("chunk_index"),
            content: row.get("content"),
            page,
            similarity,
        }
    }
}

fn storage_error(e: sqlx::Error) -> DocqaError {
    DocqaError::Storage(e.to_string())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn save_document(&self, doc: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let created_at = doc.created_at.unwrap_or(now);

        // REPLACE drops any previous row with the same id; the FK cascade
        // clears its chunks, so a re-saved document starts empty.
        sqlx::query(
            "INSERT OR REPLACE INTO documents
                (id, title, source, url, content, size, status, chunk_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7, ?8)",
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(doc.source)
        .bind(&doc.url)
        .bind(&doc.content)
        .bind(doc.size)
        .bind(created_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        self.get_document(&doc.id)
            .await?
            .ok_or_else(|| DocqaError::Storage("failed to read back saved document".to_string()))
    }

    async fn find_duplicate(
        &self,
        source: DocumentSource,
        title: &str,
        url: Option<&str>,
        size: i64,
    ) -> Result<Option<Document>> {
        match source {
            DocumentSource::File => {
                sqlx::query_as::<_, Document>(&format!(
                    "SELECT {} FROM documents WHERE source = 'file' AND title = ?1 AND size = ?2",
                    DOCUMENT_COLUMNS
                ))
                .bind(title)
                .bind(size)
                .fetch_optional(&self.pool)
                .await
            }
            DocumentSource::Url => {
                sqlx::query_as::<_, Document>(&format!(
                    "SELECT {} FROM documents WHERE source = 'url' AND url = ?1",
                    DOCUMENT_COLUMNS
                ))
                .bind(url.unwrap_or_default())
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(storage_error)
    }

    async fn save_chunks(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(DocqaError::Storage(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        for embedding in embeddings {
            self.check_dimension(embedding.dimension())?;
        }
        if self.get_document(document_id).await?.is_none() {
            return Err(DocqaError::Storage(format!(
                "unknown document: {}",
                document_id
            )));
        }

        let rows: Vec<(&TextChunk, &Embedding)> = chunks.iter().zip(embeddings).collect();
        let mut written = 0;

        for (batch_number, batch) in rows.chunks(WRITE_BATCH_SIZE).enumerate() {
            if batch_number > 0 {
                sleep(WRITE_BATCH_PAUSE).await;
            }

            let mut tx = self.pool.begin().await.map_err(storage_error)?;
            for (chunk, embedding) in batch {
                let metadata = json!({
                    "start": chunk.start,
                    "end": chunk.end,
                    "page": chunk.page,
                    "model": embedding.model,
                    "degraded": embedding.degraded,
                });

                sqlx::query(
                    "INSERT INTO chunks (id, document_id, chunk_index, content, metadata, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(document_id)
                .bind(chunk.index as i64)
                .bind(&chunk.content)
                .bind(metadata.to_string())
                .bind(Self::serialize_vector(&embedding.vector))
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            }
            tx.commit().await.map_err(storage_error)?;
            written += batch.len();
        }

        sqlx::query(
            "UPDATE documents SET status = 'indexed', chunk_count = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(written as i64)
        .bind(Utc::now())
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!("stored {} chunks for document {}", written, document_id);
        Ok(written)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(query_vector.len())?;

        let rows = sqlx::query(
            "SELECT document_id, chunk_index, content, metadata, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let scored: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_vector(&bytes);
                let similarity = cosine_similarity(query_vector, &stored).unwrap_or(0.0);
                Self::hit_from_row(row, similarity)
            })
            .collect();

        Ok(rank_hits(scored, top_k, similarity_floor))
    }

    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: Option<i64>,
    ) -> Result<()> {
        let Some(current) = self.get_document(document_id).await? else {
            return Err(DocqaError::Storage(format!(
                "unknown document: {}",
                document_id
            )));
        };
        if !current.status.can_transition_to(status) && current.status != status {
            warn!(
                "unusual status transition for {}: {} -> {}",
                document_id, current.status, status
            );
        }

        let result = if let Some(count) = chunk_count {
            sqlx::query(
                "UPDATE documents SET status = ?1, chunk_count = ?2, updated_at = ?3 WHERE id = ?4",
            )
            .bind(status)
            .bind(count)
            .bind(Utc::now())
            .bind(document_id)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query("UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(status)
                .bind(Utc::now())
                .bind(document_id)
                .execute(&self.pool)
                .await
        };

        result.map_err(storage_error)?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        // Chunks go with the document via the FK cascade.
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ?1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn document_content(&self, document_id: &str) -> Result<Option<String>> {
        let content: Option<String> =
            sqlx::query_scalar("SELECT content FROM documents WHERE id = ?1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(content)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY created_at, id",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn count_chunks(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(count as usize)
    }
}
