use std::sync::Arc;

use super::*;
use crate::chunker::ChunkingConfig;
use crate::embeddings::LocalEmbeddingProvider;
use crate::indexer::{Indexer, IngestRequest};
use crate::store::InMemoryVectorStore;
use crate::synthesis::{GenerativeBackend, NO_INFORMATION_ANSWER};

const DIM: usize = 64;

struct ScriptedBackend {
    answer: String,
}

impl GenerativeBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn health_check(&self) -> bool {
        true
    }

    fn generate(&self, _prompt: &str) -> crate::Result<String> {
        Ok(self.answer.clone())
    }
}

fn service(store: Arc<InMemoryVectorStore>, backend: Option<Arc<dyn GenerativeBackend>>) -> ChatService {
    let provider = Arc::new(LocalEmbeddingProvider::new(DIM).expect("provider"));
    let retriever = Retriever::new(provider, store);
    ChatService::new(
        retriever,
        AnswerSynthesizer::new(backend),
        RetrievalConfig::default(),
    )
}

async fn seeded_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let provider = Arc::new(LocalEmbeddingProvider::new(DIM).expect("provider"));
    let indexer = Indexer::new(provider, Arc::clone(&store) as _, ChunkingConfig::default());
    indexer
        .ingest(IngestRequest::file(
            "정책.txt",
            "광고 정책은 모든 광고주에게 적용되는 중요한 규칙입니다. 정책을 위반하면 광고 게재가 거부될 수 있습니다.",
        ))
        .await
        .expect("ingest");
    store
}

#[tokio::test]
async fn empty_corpus_yields_no_information_answer() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let service = service(store, None);

    let response = service.answer("아무 질문이나", None, None).await;

    assert_eq!(response.answer, NO_INFORMATION_ANSWER);
    assert_eq!(response.confidence, 0.0);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn grounded_query_returns_sources_and_confidence() {
    let store = seeded_store().await;
    let backend: Arc<dyn GenerativeBackend> = Arc::new(ScriptedBackend {
        answer: "**핵심 답변**\n광고 정책은 광고주가 지켜야 하는 규칙입니다.\n\n**상세 설명**\n위반 시 광고가 거부됩니다.".to_string(),
    });
    let service = service(store, Some(backend));

    let response = service
        .answer("광고 정책은 모든 광고주에게 적용되는 규칙인가요", None, Some(0.1))
        .await;

    assert!(!response.sources.is_empty());
    assert!(response.confidence > 0.0);
    assert_eq!(response.model, "scripted");
    assert!(response.answer.contains("핵심 답변"));
    assert_eq!(response.sources[0].document_title, "정책.txt");
}

#[tokio::test]
async fn unreachable_floor_gives_no_information_response() {
    let store = seeded_store().await;
    let service = service(store, None);

    let response = service.answer("광고 정책", None, Some(0.99)).await;

    assert_eq!(response.answer, NO_INFORMATION_ANSWER);
    assert_eq!(response.confidence, 0.0);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn blank_query_degrades_to_error_response() {
    let store = seeded_store().await;
    let service = service(store, None);

    let response = service.answer("   ", None, None).await;

    assert_eq!(response.answer, ERROR_ANSWER);
    assert_eq!(response.confidence, 0.0);
    assert_eq!(response.model, "error");
}

#[tokio::test]
async fn stats_count_documents_and_chunks() {
    let store = seeded_store().await;

    let stats = corpus_stats(store.as_ref()).await.expect("stats");

    assert_eq!(stats.documents, 1);
    assert!(stats.chunks >= 1);
}
