
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;

/// Fallback display title for hits whose document row has disappeared.
const UNTITLED: &str = "제목 없음";

/// A ranked retrieval hit enriched for presentation: the chunk plus the
/// owning document's denormalized title and url. Transient, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: String,
    pub document_title: String,
    pub document_url: Option<String>,
    pub chunk_index: i64,
    pub content: String,
    pub page: Option<u32>,
    pub similarity: f32,
}

/// Drives the query side: embed the query, delegate to the store's
/// nearest-neighbor scan, and enrich the raw hits for display.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { provider, store }
    }

    /// Retrieve the `top_k` most similar chunks above `similarity_floor`.
    ///
    /// An empty corpus and a floor that filters out every candidate both
    /// yield an empty list; neither is an error.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self.provider.embed_one(query)?;
        let hits = self
            .store
            .search(&query_vector, top_k, similarity_floor)
            .await?;

        debug!("query matched {} chunks (top_k {})", hits.len(), top_k);

        // Denormalize document title/url once per referenced document.
        let mut documents: HashMap<String, (String, Option<String>)> = HashMap::new();
        for hit in &hits {
            if !documents.contains_key(&hit.document_id) {
                let entry = self
                    .store
                    .get_document(&hit.document_id)
                    .await?
                    .map_or_else(
                        || (UNTITLED.to_string(), None),
                        |doc| (doc.title, doc.url),
                    );
                documents.insert(hit.document_id.clone(), entry);
            }
        }

        Ok(hits
            .into_iter()
            .map(|hit| {
                let (title, url) = documents
                    .get(&hit.document_id)
                    .cloned()
                    .unwrap_or_else(|| (UNTITLED.to_string(), None));
                SearchResult {
                    document_id: hit.document_id,
                    document_title: title,
                    document_url: url,
                    chunk_index: hit.chunk_index,
                    content: hit.content,
                    page: hit.page,
                    similarity: hit.similarity,
                }
            })
            .collect())
    }
}
