
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunker::{ChunkingConfig, chunk_text};
use crate::embeddings::EmbeddingProvider;
use crate::store::{
    DocumentSource, DocumentStatus, NewDocument, VectorStore, normalize_url,
};
use crate::{DocqaError, Result};

/// Extracted text plus source metadata handed to the core by the ingestion
/// collaborators. Raw-format extraction happens upstream; `content` is
/// already plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Caller-supplied id; generated when absent.
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub source: DocumentSource,
    pub url: Option<String>,
    /// Source size in bytes. Defaults to the content length.
    pub size: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl IngestRequest {
    #[inline]
    pub fn file(title: &str, content: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            content: content.to_string(),
            source: DocumentSource::File,
            url: None,
            size: None,
            created_at: None,
        }
    }

    #[inline]
    pub fn url(title: &str, url: &str, content: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            content: content.to_string(),
            source: DocumentSource::Url,
            url: Some(url.to_string()),
            size: None,
            created_at: None,
        }
    }
}

/// Why an ingestion was skipped without doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The same source is already fully indexed; re-running is a no-op.
    AlreadyIndexed,
    /// Another worker appears to own the document right now.
    InProgress,
}

/// Outcome of one document's ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub status: DocumentStatus,
    pub chunks_processed: usize,
    pub embeddings_generated: usize,
    pub degraded_embeddings: usize,
    pub processing_time_ms: u64,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
}

/// Drives document ingestion: duplicate check, chunk, embed, store, with
/// lifecycle status transitions and failure isolation.
pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            provider,
            store,
            chunking,
        }
    }

    /// Ingest one document. Pipeline failures are reported in the returned
    /// record with the document marked `failed`; only errors that prevent
    /// establishing the document at all surface as `Err`.
    #[inline]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let started = Instant::now();

        let normalized_url = match (&request.source, &request.url) {
            (DocumentSource::Url, Some(raw)) => Some(normalize_url(raw)?),
            _ => None,
        };
        let size = request.size.unwrap_or(request.content.len() as i64);

        // Explicitly supplied ids must not collide with existing documents.
        if let Some(id) = &request.id {
            if self.store.get_document(id).await?.is_some() {
                return Err(DocqaError::DuplicateDocument(id.clone()));
            }
        }

        if let Some(existing) = self
            .store
            .find_duplicate(
                request.source,
                &request.title,
                normalized_url.as_deref(),
                size,
            )
            .await?
        {
            match existing.status {
                DocumentStatus::Indexed => {
                    info!(
                        "skipping '{}': already indexed as {} ({} chunks)",
                        request.title, existing.id, existing.chunk_count
                    );
                    return Ok(IngestReport {
                        document_id: existing.id,
                        status: DocumentStatus::Indexed,
                        chunks_processed: existing.chunk_count as usize,
                        embeddings_generated: 0,
                        degraded_embeddings: 0,
                        processing_time_ms: elapsed_ms(started),
                        skipped: Some(SkipReason::AlreadyIndexed),
                        error: None,
                    });
                }
                DocumentStatus::Failed => {
                    // Retry from scratch: drop the failed attempt entirely.
                    warn!(
                        "previous attempt for '{}' failed, deleting {} and retrying",
                        request.title, existing.id
                    );
                    self.store.delete_document(&existing.id).await?;
                }
                DocumentStatus::Pending | DocumentStatus::Processing => {
                    // Best-effort: assume another worker owns it. No lock is
                    // taken, so this does not guarantee exclusivity.
                    info!(
                        "skipping '{}': document {} is {}",
                        request.title, existing.id, existing.status
                    );
                    return Ok(IngestReport {
                        document_id: existing.id,
                        status: existing.status,
                        chunks_processed: 0,
                        embeddings_generated: 0,
                        degraded_embeddings: 0,
                        processing_time_ms: elapsed_ms(started),
                        skipped: Some(SkipReason::InProgress),
                        error: None,
                    });
                }
            }
        }

        let document_id = request
            .id
            .clone()
            .unwrap_or_else(|| format!("doc_{}", Uuid::new_v4()));

        let document = self
            .store
            .save_document(NewDocument {
                id: document_id.clone(),
                title: request.title.clone(),
                source: request.source,
                url: normalized_url,
                content: request.content.clone(),
                size,
                created_at: request.created_at,
            })
            .await?;

        info!("ingesting document {} ('{}')", document.id, document.title);

        self.store
            .update_status(&document.id, DocumentStatus::Processing, None)
            .await?;

        match self.run_pipeline(&document.id, &request.content).await {
            Ok(stats) => {
                info!(
                    "indexed document {}: {} chunks, {} degraded embeddings in {}ms",
                    document.id,
                    stats.chunks,
                    stats.degraded,
                    elapsed_ms(started)
                );
                Ok(IngestReport {
                    document_id: document.id,
                    status: DocumentStatus::Indexed,
                    chunks_processed: stats.chunks,
                    embeddings_generated: stats.embeddings,
                    degraded_embeddings: stats.degraded,
                    processing_time_ms: elapsed_ms(started),
                    skipped: None,
                    error: None,
                })
            }
            Err(e) => {
                error!("ingestion failed for document {}: {}", document.id, e);
                if let Err(status_err) = self
                    .store
                    .update_status(&document.id, DocumentStatus::Failed, Some(0))
                    .await
                {
                    error!(
                        "could not mark document {} failed: {}",
                        document.id, status_err
                    );
                }
                Ok(IngestReport {
                    document_id: document.id,
                    status: DocumentStatus::Failed,
                    chunks_processed: 0,
                    embeddings_generated: 0,
                    degraded_embeddings: 0,
                    processing_time_ms: elapsed_ms(started),
                    skipped: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Ingest a batch of documents sequentially, isolating per-document
    /// failures so one bad source never aborts its siblings.
    #[inline]
    pub async fn ingest_many(&self, requests: Vec<IngestRequest>) -> Vec<IngestReport> {
        let mut reports = Vec::with_capacity(requests.len());

        for request in requests {
            let title = request.title.clone();
            match self.ingest(request).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("ingestion aborted for '{}': {}", title, e);
                    reports.push(IngestReport {
                        document_id: String::new(),
                        status: DocumentStatus::Failed,
                        chunks_processed: 0,
                        embeddings_generated: 0,
                        degraded_embeddings: 0,
                        processing_time_ms: 0,
                        skipped: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        reports
    }

    /// Re-run ingestion for an existing document from its stored source
    /// text: prior chunks are deleted, the status resets to `pending`, and
    /// the pipeline runs again.
    #[inline]
    pub async fn reindex(&self, document_id: &str) -> Result<IngestReport> {
        let started = Instant::now();

        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| DocqaError::Storage(format!("unknown document: {}", document_id)))?;
        let content = self
            .store
            .document_content(document_id)
            .await?
            .ok_or_else(|| DocqaError::Storage(format!("no stored content for: {}", document_id)))?;

        info!("reindexing document {} ('{}')", document.id, document.title);

        let removed = self.store.delete_chunks(document_id).await?;
        if removed > 0 {
            info!("dropped {} stale chunks from {}", removed, document_id);
        }
        self.store
            .update_status(document_id, DocumentStatus::Pending, Some(0))
            .await?;
        self.store
            .update_status(document_id, DocumentStatus::Processing, None)
            .await?;

        match self.run_pipeline(document_id, &content).await {
            Ok(stats) => Ok(IngestReport {
                document_id: document_id.to_string(),
                status: DocumentStatus::Indexed,
                chunks_processed: stats.chunks,
                embeddings_generated: stats.embeddings,
                degraded_embeddings: stats.degraded,
                processing_time_ms: elapsed_ms(started),
                skipped: None,
                error: None,
            }),
            Err(e) => {
                error!("reindex failed for document {}: {}", document_id, e);
                if let Err(status_err) = self
                    .store
                    .update_status(document_id, DocumentStatus::Failed, Some(0))
                    .await
                {
                    error!(
                        "could not mark document {} failed: {}",
                        document_id, status_err
                    );
                }
                Ok(IngestReport {
                    document_id: document_id.to_string(),
                    status: DocumentStatus::Failed,
                    chunks_processed: 0,
                    embeddings_generated: 0,
                    degraded_embeddings: 0,
                    processing_time_ms: elapsed_ms(started),
                    skipped: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// chunk -> embed -> store. Steps are strictly sequential because each
    /// depends on the previous one's output.
    async fn run_pipeline(&self, document_id: &str, content: &str) -> Result<PipelineStats> {
        let chunks = chunk_text(content, &self.chunking);
        if chunks.is_empty() {
            // Whitespace-only content: an indexed document with no chunks.
            self.store
                .update_status(document_id, DocumentStatus::Indexed, Some(0))
                .await?;
            return Ok(PipelineStats {
                chunks: 0,
                embeddings: 0,
                degraded: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.provider.embed_many(&texts);
        let degraded = embeddings.iter().filter(|e| e.degraded).count();

        // Isolated failures are tolerated; a fully degraded batch means the
        // backend is down and the document must not pretend to be indexed.
        if degraded == embeddings.len() {
            return Err(DocqaError::BackendUnavailable(format!(
                "embedding backend degraded all {} chunks",
                embeddings.len()
            )));
        }
        if degraded > 0 {
            warn!(
                "{} of {} chunks received degraded embeddings",
                degraded,
                embeddings.len()
            );
        }

        let written = self
            .store
            .save_chunks(document_id, &chunks, &embeddings)
            .await?;

        Ok(PipelineStats {
            chunks: written,
            embeddings: embeddings.len(),
            degraded,
        })
    }
}

struct PipelineStats {
    chunks: usize,
    embeddings: usize,
    degraded: usize,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
