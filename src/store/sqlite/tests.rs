use super::*;
use tempfile::TempDir;

async fn test_store(dimension: usize) -> (TempDir, SqliteVectorStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteVectorStore::new(dir.path().join("test.db"), dimension)
        .await
        .expect("store");
    (dir, store)
}

fn new_doc(id: &str, title: &str, size: i64) -> NewDocument {
    NewDocument {
        id: id.to_string(),
        title: title.to_string(),
        source: DocumentSource::File,
        url: None,
        content: "원본 문서 텍스트".to_string(),
        size,
        created_at: None,
    }
}

fn chunk(index: usize, content: &str) -> TextChunk {
    TextChunk {
        index,
        content: content.to_string(),
        start: index * 100,
        end: index * 100 + content.len(),
        page: Some(index as u32 + 1),
    }
}

fn embedding(vector: Vec<f32>) -> Embedding {
    Embedding::new(vector, "test-model")
}

#[tokio::test]
async fn documents_round_trip() {
    let (_dir, store) = test_store(2).await;

    let saved = store
        .save_document(new_doc("d1", "문서 제목", 512))
        .await
        .expect("save");
    assert_eq!(saved.status, DocumentStatus::Pending);

    let loaded = store.get_document("d1").await.expect("get").expect("doc");
    assert_eq!(loaded.title, "문서 제목");
    assert_eq!(loaded.size, 512);
    assert_eq!(loaded.source, DocumentSource::File);
    assert_eq!(loaded.chunk_count, 0);

    let content = store
        .document_content("d1")
        .await
        .expect("content")
        .expect("present");
    assert_eq!(content, "원본 문서 텍스트");
}

#[tokio::test]
async fn vectors_survive_blob_round_trip() {
    let (_dir, store) = test_store(3).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");

    store
        .save_chunks(
            "d1",
            &[chunk(0, "hello")],
            &[embedding(vec![0.25, -1.5, 3.75])],
        )
        .await
        .expect("chunks");

    let hits = store
        .search(&[0.25, -1.5, 3.75], 1, 0.0)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    assert_eq!(hits[0].page, Some(1));
}

#[tokio::test]
async fn save_chunks_updates_lifecycle() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");
    store
        .update_status("d1", DocumentStatus::Processing, None)
        .await
        .expect("processing");

    let written = store
        .save_chunks(
            "d1",
            &[chunk(0, "one"), chunk(1, "two")],
            &[embedding(vec![1.0, 0.0]), embedding(vec![0.0, 1.0])],
        )
        .await
        .expect("chunks");
    assert_eq!(written, 2);

    let doc = store.get_document("d1").await.expect("get").expect("doc");
    assert_eq!(doc.status, DocumentStatus::Indexed);
    assert_eq!(doc.chunk_count, 2);
    assert_eq!(store.count_chunks().await.expect("count"), 2);
}

#[tokio::test]
async fn dimension_is_enforced_on_write_and_query() {
    let (_dir, store) = test_store(3).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");

    let write = store
        .save_chunks("d1", &[chunk(0, "text")], &[embedding(vec![1.0])])
        .await;
    assert!(matches!(write, Err(DocqaError::DimensionMismatch { .. })));

    let query = store.search(&[1.0], 5, 0.0).await;
    assert!(matches!(query, Err(DocqaError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn duplicate_lookup_by_title_and_size() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "report.txt", 1234))
        .await
        .expect("save");

    assert!(
        store
            .find_duplicate(DocumentSource::File, "report.txt", None, 1234)
            .await
            .expect("lookup")
            .is_some()
    );
    assert!(
        store
            .find_duplicate(DocumentSource::File, "report.txt", None, 1)
            .await
            .expect("lookup")
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_lookup_by_url() {
    let (_dir, store) = test_store(2).await;
    let mut doc = new_doc("d1", "페이지", 0);
    doc.source = DocumentSource::Url;
    doc.url = Some("https://example.com/page".to_string());
    store.save_document(doc).await.expect("save");

    assert!(
        store
            .find_duplicate(
                DocumentSource::Url,
                "ignored",
                Some("https://example.com/page"),
                0
            )
            .await
            .expect("lookup")
            .is_some()
    );
}

#[tokio::test]
async fn delete_document_cascades_to_chunks() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");
    store
        .save_chunks("d1", &[chunk(0, "text")], &[embedding(vec![1.0, 0.0])])
        .await
        .expect("chunks");

    assert!(store.delete_document("d1").await.expect("delete"));
    assert_eq!(store.count_chunks().await.expect("count"), 0);
    assert!(store.get_document("d1").await.expect("get").is_none());
}

#[tokio::test]
async fn resaving_a_document_clears_stale_chunks() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");
    store
        .save_chunks("d1", &[chunk(0, "old")], &[embedding(vec![1.0, 0.0])])
        .await
        .expect("chunks");

    let resaved = store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("resave");
    assert_eq!(resaved.status, DocumentStatus::Pending);
    assert_eq!(store.count_chunks().await.expect("count"), 0);
}

#[tokio::test]
async fn batched_writes_handle_more_than_one_batch() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "big", 10))
        .await
        .expect("save");

    let count = WRITE_BATCH_SIZE + 25;
    let chunks: Vec<TextChunk> = (0..count).map(|i| chunk(i, "chunk body")).collect();
    let embeddings: Vec<Embedding> = (0..count).map(|_| embedding(vec![1.0, 0.0])).collect();

    let written = store
        .save_chunks("d1", &chunks, &embeddings)
        .await
        .expect("chunks");

    assert_eq!(written, count);
    assert_eq!(store.count_chunks().await.expect("count"), count);
}

#[tokio::test]
async fn chunk_metadata_records_the_embedding_model() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");
    store
        .save_chunks("d1", &[chunk(0, "text")], &[embedding(vec![1.0, 0.0])])
        .await
        .expect("chunks");

    let metadata: String = sqlx::query_scalar("SELECT metadata FROM chunks LIMIT 1")
        .fetch_one(store.pool())
        .await
        .expect("metadata");
    let parsed: serde_json::Value = serde_json::from_str(&metadata).expect("json");

    assert_eq!(parsed["model"], "test-model");
    assert_eq!(parsed["degraded"], false);
}

#[tokio::test]
async fn search_returns_ties_in_chunk_order() {
    let (_dir, store) = test_store(2).await;
    store
        .save_document(new_doc("d1", "doc", 10))
        .await
        .expect("save");
    store
        .save_chunks(
            "d1",
            &[chunk(0, "first"), chunk(1, "second"), chunk(2, "third")],
            &[
                embedding(vec![1.0, 0.0]),
                embedding(vec![1.0, 0.0]),
                embedding(vec![1.0, 0.0]),
            ],
        )
        .await
        .expect("chunks");

    let hits = store.search(&[1.0, 0.0], 3, 0.0).await.expect("search");
    let order: Vec<i64> = hits.iter().map(|h| h.chunk_index).collect();
    assert_eq!(order, vec![0, 1, 2]);
}
