#[cfg(test)]
mod tests;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::Result;
use crate::config::RetrievalConfig;
use crate::retrieval::{Retriever, SearchResult};
use crate::store::VectorStore;
use crate::synthesis::AnswerSynthesizer;

/// Answer returned when the query path itself fails. The caller always
/// receives a well-formed response, never a raw error.
const ERROR_ANSWER: &str =
    "죄송합니다. 답변을 생성하는 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Final response of the query API: the answer, the evidence it was
/// grounded on, a coarse confidence signal, and processing latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub model: String,
}

/// Corpus counters for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Retrieval-to-answer orchestration consumed by the chat UI.
pub struct ChatService {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    defaults: RetrievalConfig,
}

impl ChatService {
    #[inline]
    pub fn new(
        retriever: Retriever,
        synthesizer: AnswerSynthesizer,
        defaults: RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            defaults,
        }
    }

    /// Answer a query. Internal failures degrade to a zero-confidence
    /// apology response instead of propagating.
    #[inline]
    pub async fn answer(
        &self,
        query: &str,
        top_k: Option<usize>,
        similarity_floor: Option<f32>,
    ) -> ChatResponse {
        let started = Instant::now();
        let top_k = top_k.unwrap_or(self.defaults.top_k);
        let floor = similarity_floor.unwrap_or(self.defaults.similarity_floor);

        let results = match self.retriever.retrieve(query, top_k, floor).await {
            Ok(results) => results,
            Err(e) => {
                error!("query failed before synthesis: {}", e);
                return ChatResponse {
                    answer: ERROR_ANSWER.to_string(),
                    sources: Vec::new(),
                    confidence: 0.0,
                    processing_time_ms: elapsed_ms(started),
                    model: "error".to_string(),
                };
            }
        };

        debug!("retrieved {} sources for query", results.len());

        let synthesis = self.synthesizer.synthesize(query, &results);

        ChatResponse {
            answer: synthesis.answer,
            sources: results,
            confidence: synthesis.confidence,
            processing_time_ms: elapsed_ms(started),
            model: synthesis.model,
        }
    }
}

/// Corpus counters used by status displays.
#[inline]
pub async fn corpus_stats(store: &dyn VectorStore) -> Result<CorpusStats> {
    Ok(CorpusStats {
        documents: store.list_documents().await?.len(),
        chunks: store.count_chunks().await?,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
