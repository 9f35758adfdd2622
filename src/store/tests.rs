use super::*;

fn hit(document_id: &str, chunk_index: i64, similarity: f32) -> SearchHit {
    SearchHit {
        document_id: document_id.to_string(),
        chunk_index,
        content: format!("chunk {}", chunk_index),
        page: None,
        similarity,
    }
}

#[test]
fn rank_hits_filters_below_floor() {
    let hits = vec![hit("d1", 0, 0.9), hit("d1", 1, 0.4), hit("d1", 2, 0.8)];
    let ranked = rank_hits(hits, 10, 0.5);

    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|h| h.similarity >= 0.5));
}

#[test]
fn rank_hits_orders_by_descending_similarity() {
    let hits = vec![hit("d1", 0, 0.3), hit("d1", 1, 0.9), hit("d1", 2, 0.6)];
    let ranked = rank_hits(hits, 10, 0.0);

    let sims: Vec<f32> = ranked.iter().map(|h| h.similarity).collect();
    assert_eq!(sims, vec![0.9, 0.6, 0.3]);
}

#[test]
fn rank_hits_breaks_exact_ties_by_chunk_index() {
    let hits = vec![hit("d1", 7, 0.5), hit("d1", 2, 0.5), hit("d1", 4, 0.5)];
    let ranked = rank_hits(hits, 10, 0.0);

    let indices: Vec<i64> = ranked.iter().map(|h| h.chunk_index).collect();
    assert_eq!(indices, vec![2, 4, 7]);
}

#[test]
fn rank_hits_truncates_to_top_k() {
    let hits = (0..20).map(|i| hit("d1", i, 0.5 + i as f32 * 0.01)).collect();
    let ranked = rank_hits(hits, 3, 0.0);

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].chunk_index, 19);
}

#[test]
fn normalize_url_drops_fragment_and_trailing_slash() {
    assert_eq!(
        normalize_url("https://example.com/docs/#section").expect("valid url"),
        "https://example.com/docs"
    );
    assert_eq!(
        normalize_url("https://example.com/").expect("valid url"),
        "https://example.com"
    );
    assert_eq!(
        normalize_url("https://example.com").expect("valid url"),
        "https://example.com"
    );
}

#[test]
fn normalize_url_rejects_garbage() {
    assert!(normalize_url("not a url").is_err());
}
