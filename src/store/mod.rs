#[cfg(test)]
mod tests;

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryVectorStore;
pub use models::{Document, DocumentSource, DocumentStatus, NewDocument, SearchHit};
pub use sqlite::SqliteVectorStore;

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::Result;
use crate::chunker::TextChunk;
use crate::embeddings::Embedding;

/// Rows written per insert batch during chunk persistence.
pub const WRITE_BATCH_SIZE: usize = 100;

/// Pause between write batches, bounding backpressure on the datastore.
pub const WRITE_BATCH_PAUSE: Duration = Duration::from_millis(50);

/// Persistence contract for documents, chunks, and their vectors, plus
/// brute-force nearest-neighbor search.
///
/// Implementations are constructed with the active embedding dimension and
/// must refuse vectors that disagree with it instead of silently comparing
/// mismatched vectors. The connection may be shared read-mostly across
/// queries; writes are single-writer per document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create or update a document row. Fresh ingestions start `pending`.
    async fn save_document(&self, doc: NewDocument) -> Result<Document>;

    /// Look up an existing document by duplicate key: title + size for
    /// files, normalized URL for url sources.
    async fn find_duplicate(
        &self,
        source: DocumentSource,
        title: &str,
        url: Option<&str>,
        size: i64,
    ) -> Result<Option<Document>>;

    /// Bulk-insert chunk rows with their vectors, in batches with a short
    /// pause in between. On completion the document's chunk count is set
    /// and its status becomes `indexed`. Returns the number of rows
    /// written.
    async fn save_chunks(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
        embeddings: &[Embedding],
    ) -> Result<usize>;

    /// Brute-force cosine scan over all stored vectors. Candidates below
    /// the floor are discarded; the rest are sorted by descending
    /// similarity (ties broken by ascending chunk index) and the first
    /// `top_k` returned.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SearchHit>>;

    /// Transition a document's lifecycle status. Callable from failure
    /// paths even when earlier steps only partially completed.
    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: Option<i64>,
    ) -> Result<()>;

    /// Remove a document and all of its chunks. Returns whether a document
    /// existed.
    async fn delete_document(&self, document_id: &str) -> Result<bool>;

    /// Remove only the chunks of a document, keeping the document row.
    /// Used by the reindex path. Returns the number of removed chunks.
    async fn delete_chunks(&self, document_id: &str) -> Result<usize>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;

    /// The stored source text of a document, for reindexing.
    async fn document_content(&self, document_id: &str) -> Result<Option<String>>;

    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn count_chunks(&self) -> Result<usize>;
}

/// Filter, order, and truncate scored hits: floor filter, similarity
/// descending, exact ties resolved by ascending chunk index.
pub(crate) fn rank_hits(
    mut hits: Vec<SearchHit>,
    top_k: usize,
    similarity_floor: f32,
) -> Vec<SearchHit> {
    hits.retain(|hit| hit.similarity >= similarity_floor);
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(top_k);
    hits
}

/// Canonical form of a URL used as the duplicate key for url sources:
/// parsed, fragment dropped, trailing slash trimmed.
#[inline]
pub fn normalize_url(raw: &str) -> Result<String> {
    let mut parsed = Url::parse(raw)
        .map_err(|e| crate::DocqaError::Config(format!("invalid URL '{}': {}", raw, e)))?;
    parsed.set_fragment(None);

    let mut normalized = parsed.to_string();
    while normalized.ends_with('/') && normalized.len() > parsed.scheme().len() + 3 {
        normalized.pop();
    }
    Ok(normalized)
}
