use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::{EmbeddingBackend, EmbeddingConfig, OllamaConfig};

fn test_config(dimension: usize, batch_size: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        backend: EmbeddingBackend::Remote,
        model: "test-embed".to_string(),
        dimension,
        batch_size,
        timeout_secs: 5,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(1, Duration::from_millis(1), Duration::ZERO)
}

fn provider_for(server: &MockServer, dimension: usize, batch_size: usize) -> RemoteEmbeddingProvider {
    let url = Url::parse(&server.uri()).expect("mock server uri");
    let ollama = OllamaConfig {
        protocol: "http".to_string(),
        host: url.host_str().expect("host").to_string(),
        port: url.port().expect("port"),
    };
    RemoteEmbeddingProvider::new(&ollama, &test_config(dimension, batch_size), fast_retry())
        .expect("provider")
}

#[test]
fn client_configuration() {
    let ollama = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
    };
    let provider =
        RemoteEmbeddingProvider::new(&ollama, &test_config(768, 16), RetryPolicy::default())
            .expect("provider");

    assert_eq!(provider.model_name(), "test-embed");
    assert_eq!(provider.dimension(), 768);
    assert_eq!(provider.base_url.host_str(), Some("test-host"));
    assert_eq!(provider.base_url.port(), Some(1234));

    let provider = provider.with_timeout(Duration::from_secs(60));
    assert_eq!(provider.model_name(), "test-embed");
}

#[test]
fn blank_input_is_rejected_before_any_request() {
    let ollama = OllamaConfig::default();
    let provider =
        RemoteEmbeddingProvider::new(&ollama, &test_config(768, 16), fast_retry())
            .expect("provider");

    assert!(matches!(
        provider.embed_one("  \n "),
        Err(DocqaError::EmptyInput)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_one_accepts_matching_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.1, 0.2, 0.3] })),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, 3, 16);
    let vector = tokio::task::spawn_blocking(move || provider.embed_one("hello world"))
        .await
        .expect("join")
        .expect("embedding");

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_one_rejects_wrong_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.1, 0.2] })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 3, 16);
    let result = tokio::task::spawn_blocking(move || provider.embed_one("hello world"))
        .await
        .expect("join");

    assert!(matches!(
        result,
        Err(DocqaError::DimensionMismatch {
            expected: 3,
            got: 2
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_returns_vectors_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 2, 16);
    let texts = vec!["first text".to_string(), "second text".to_string()];
    let embeddings = tokio::task::spawn_blocking(move || provider.embed_many(&texts))
        .await
        .expect("join");

    assert_eq!(embeddings.len(), 2);
    assert!(!embeddings[0].degraded);
    assert_eq!(embeddings[0].vector, vec![1.0, 0.0]);
    assert_eq!(embeddings[1].vector, vec![0.0, 1.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_failure_degrades_the_batch_instead_of_erroring() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 4, 16);
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let embeddings = tokio::task::spawn_blocking(move || provider.embed_many(&texts))
        .await
        .expect("join");

    assert_eq!(embeddings.len(), 3);
    assert!(embeddings.iter().all(|e| e.degraded));
    assert!(embeddings.iter().all(|e| e.dimension() == 4));
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_items_degrade_without_hitting_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, 0.5] })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 2, 16);
    let texts = vec!["   ".to_string(), "real content".to_string()];
    let embeddings = tokio::task::spawn_blocking(move || provider.embed_many(&texts))
        .await
        .expect("join");

    assert!(embeddings[0].degraded);
    assert!(!embeddings[1].degraded);
    assert_eq!(embeddings[1].vector, vec![0.5, 0.5]);
}
