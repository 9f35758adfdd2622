
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::{Document, DocumentSource, DocumentStatus, NewDocument, SearchHit};
use super::{VectorStore, rank_hits};
use crate::chunker::TextChunk;
use crate::embeddings::{Embedding, cosine_similarity};
use crate::{DocqaError, Result};

/// In-memory implementation of the store contract.
///
/// Selected via configuration for deployments without a datastore and used
/// heavily in tests. Same dimension rules and ranking behavior as the
/// sqlite store; data does not survive the process.
pub struct InMemoryVectorStore {
    dimension: usize,
    inner: RwLock<HashMap<String, MemoryDocument>>,
}

struct MemoryDocument {
    document: Document,
    content: String,
    chunks: Vec<MemoryChunk>,
}

struct MemoryChunk {
    chunk_index: i64,
    content: String,
    page: Option<u32>,
    vector: Vec<f32>,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(HashMap::new()),
        }
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
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn save_document(&self, doc: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let document = Document {
            id: doc.id.clone(),
            title: doc.title,
            source: doc.source,
            url: doc.url,
            size: doc.size,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            created_at: doc.created_at.unwrap_or(now),
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        inner.insert(
            doc.id,
            MemoryDocument {
                document: document.clone(),
                content: doc.content,
                chunks: Vec::new(),
            },
        );

        Ok(document)
    }

    async fn find_duplicate(
        &self,
        source: DocumentSource,
        title: &str,
        url: Option<&str>,
        size: i64,
    ) -> Result<Option<Document>> {
        let inner = self.inner.read().await;
        let found = inner.values().find(|entry| {
            let doc = &entry.document;
            match source {
                DocumentSource::File => {
                    doc.source == DocumentSource::File && doc.title == title && doc.size == size
                }
                DocumentSource::Url => {
                    doc.source == DocumentSource::Url && doc.url.as_deref() == url
                }
            }
        });
        Ok(found.map(|entry| entry.document.clone()))
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

        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(document_id)
            .ok_or_else(|| DocqaError::Storage(format!("unknown document: {}", document_id)))?;

        entry.chunks.clear();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entry.chunks.push(MemoryChunk {
                chunk_index: chunk.index as i64,
                content: chunk.content.clone(),
                page: chunk.page,
                vector: embedding.vector.clone(),
            });
        }

        entry.document.chunk_count = entry.chunks.len() as i64;
        entry.document.status = DocumentStatus::Indexed;
        entry.document.updated_at = Utc::now();

        debug!(
            "stored {} chunks for document {}",
            entry.chunks.len(),
            document_id
        );
        Ok(entry.chunks.len())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(query_vector.len())?;

        let inner = self.inner.read().await;
        let mut scored = Vec::new();
        for entry in inner.values() {
            for chunk in &entry.chunks {
                let similarity =
                    cosine_similarity(query_vector, &chunk.vector).unwrap_or(0.0);
                scored.push(SearchHit {
                    document_id: entry.document.id.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    page: chunk.page,
                    similarity,
                });
            }
        }

        Ok(rank_hits(scored, top_k, similarity_floor))
    }

    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: Option<i64>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(document_id)
            .ok_or_else(|| DocqaError::Storage(format!("unknown document: {}", document_id)))?;

        if !entry.document.status.can_transition_to(status) && entry.document.status != status {
            warn!(
                "unusual status transition for {}: {} -> {}",
                document_id, entry.document.status, status
            );
        }

        entry.document.status = status;
        if let Some(count) = chunk_count {
            entry.document.chunk_count = count;
        }
        entry.document.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.remove(document_id).is_some())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(document_id)
            .ok_or_else(|| DocqaError::Storage(format!("unknown document: {}", document_id)))?;
        let removed = entry.chunks.len();
        entry.chunks.clear();
        Ok(removed)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.get(document_id).map(|entry| entry.document.clone()))
    }

    async fn document_content(&self, document_id: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner.get(document_id).map(|entry| entry.content.clone()))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        let mut documents: Vec<Document> =
            inner.values().map(|entry| entry.document.clone()).collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(documents)
    }

    async fn count_chunks(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.values().map(|entry| entry.chunks.len()).sum())
    }
}
