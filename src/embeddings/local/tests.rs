use super::*;
use crate::embeddings::cosine_similarity;

#[test]
fn rejects_zero_dimension() {
    assert!(LocalEmbeddingProvider::new(0).is_err());
}

#[test]
fn vectors_have_declared_dimension() {
    let provider = LocalEmbeddingProvider::new(64).expect("valid dimension");
    let vector = provider.embed_one("hello world").expect("non-empty input");
    assert_eq!(vector.len(), 64);
    assert_eq!(provider.dimension(), 64);
}

#[test]
fn identical_text_embeds_identically() {
    let provider = LocalEmbeddingProvider::new(128).expect("valid dimension");
    let a = provider.embed_one("광고 정책 위반 사례").expect("non-empty");
    let b = provider.embed_one("광고 정책 위반 사례").expect("non-empty");

    assert_eq!(a, b);
    let sim = cosine_similarity(&a, &b).expect("same dimension");
    assert!((sim - 1.0).abs() < 1e-5);
}

#[test]
fn shared_vocabulary_scores_higher_than_unrelated_text() {
    let provider = LocalEmbeddingProvider::new(256).expect("valid dimension");
    let base = provider
        .embed_one("meta advertising policy review process")
        .expect("non-empty");
    let related = provider
        .embed_one("advertising policy review steps")
        .expect("non-empty");
    let unrelated = provider
        .embed_one("chocolate cake baking temperature")
        .expect("non-empty");

    let related_sim = cosine_similarity(&base, &related).expect("same dimension");
    let unrelated_sim = cosine_similarity(&base, &unrelated).expect("same dimension");
    assert!(related_sim > unrelated_sim);
}

#[test]
fn blank_input_is_an_error() {
    let provider = LocalEmbeddingProvider::new(32).expect("valid dimension");
    assert!(matches!(
        provider.embed_one("   "),
        Err(crate::DocqaError::EmptyInput)
    ));
}

#[test]
fn batch_degrades_blank_items_without_aborting() {
    let provider = LocalEmbeddingProvider::new(32).expect("valid dimension");
    let texts = vec![
        "first real text".to_string(),
        "   ".to_string(),
        "second real text".to_string(),
    ];

    let embeddings = provider.embed_many(&texts);

    assert_eq!(embeddings.len(), 3);
    assert!(!embeddings[0].degraded);
    assert!(embeddings[1].degraded);
    assert!(!embeddings[2].degraded);
    assert!(embeddings[1].vector.iter().all(|v| *v == 0.0));
}

#[test]
fn vectors_are_unit_length() {
    let provider = LocalEmbeddingProvider::new(64).expect("valid dimension");
    let vector = provider
        .embed_one("several distinct tokens in here")
        .expect("non-empty");
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}
