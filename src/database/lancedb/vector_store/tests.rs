use super::*;
use crate::database::ChunkMetadata;
use tempfile::TempDir;

async fn create_test_store() -> (LanceVectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = LanceVectorStore::open(temp_dir.path().join("storage"))
        .await
        .expect("should open vector store");
    (store, temp_dir)
}

fn create_test_embedding_record(id: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        vector,
        text: format!("This is test content for chunk {}", id),
        metadata: ChunkMetadata {
            document_id: "doc_1".to_string(),
            file_path: "data/test.md".to_string(),
            file_name: "test.md".to_string(),
            chunk_index: 0,
            token_count: 25,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

fn axis_records() -> Vec<EmbeddingRecord> {
    vec![
        create_test_embedding_record("x", vec![1.0, 0.0, 0.0]),
        create_test_embedding_record("y", vec![0.0, 1.0, 0.0]),
        create_test_embedding_record("xy", vec![0.7, 0.7, 0.0]),
    ]
}

#[tokio::test]
async fn open_creates_directory() {
    let (store, _temp_dir) = create_test_store().await;

    assert!(store.persist_dir().is_dir());
}

#[tokio::test]
async fn upsert_creates_collection() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .upsert("docs", axis_records())
        .await
        .expect("should store embeddings successfully");

    let count = store.count("docs").await.expect("should count rows");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn upsert_replaces_existing_ids() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .upsert("docs", axis_records())
        .await
        .expect("first upsert should succeed");
    store
        .upsert(
            "docs",
            vec![
                create_test_embedding_record("x", vec![0.0, 0.0, 1.0]),
                create_test_embedding_record("z", vec![0.0, 0.0, 1.0]),
            ],
        )
        .await
        .expect("second upsert should succeed");

    let count = store.count("docs").await.expect("should count rows");
    assert_eq!(count, 4);

    let results = store
        .query("docs", &[0.0, 0.0, 1.0], 2)
        .await
        .expect("search should succeed");
    let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["x", "z"]);
}

#[tokio::test]
async fn query_orders_by_similarity() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .upsert("docs", axis_records())
        .await
        .expect("should store embeddings successfully");

    let results = store
        .query("docs", &[1.0, 0.1, 0.0], 3)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "x");
    assert_eq!(results[1].id, "xy");
    assert_eq!(results[2].id, "y");
    assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
    assert!(results[0].score > 0.9 && results[0].score <= 1.0 + 1e-5);
    assert_eq!(results[0].metadata.file_name, "test.md");
}

#[tokio::test]
async fn query_respects_top_k() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .upsert("docs", axis_records())
        .await
        .expect("should store embeddings successfully");

    let results = store
        .query("docs", &[1.0, 0.0, 0.0], 1)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn query_missing_collection_is_empty() {
    let (store, _temp_dir) = create_test_store().await;

    let results = store
        .query("absent", &[1.0, 0.0], 5)
        .await
        .expect("search should succeed");

    assert!(results.is_empty());
}

#[tokio::test]
async fn dimension_mismatch_rejected() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .upsert("docs", axis_records())
        .await
        .expect("should store embeddings successfully");

    let result = store
        .upsert("docs", vec![create_test_embedding_record("w", vec![1.0, 0.0])])
        .await;

    assert!(matches!(result, Err(RagError::Database(_))));
}

#[tokio::test]
async fn delete_collection_reports_existence() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .upsert("docs", axis_records())
        .await
        .expect("should store embeddings successfully");

    assert!(store.delete_collection("docs").await.expect("delete should succeed"));
    assert!(!store.delete_collection("docs").await.expect("delete should succeed"));
    assert_eq!(store.count("docs").await.expect("should count rows"), 0);
}

#[tokio::test]
async fn collections_are_independent() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .upsert("a", axis_records())
        .await
        .expect("should store embeddings successfully");
    store
        .upsert("b", vec![create_test_embedding_record("only", vec![1.0, 0.0])])
        .await
        .expect("different dimension in another collection is fine");

    assert_eq!(store.count("a").await.expect("should count rows"), 3);
    assert_eq!(store.count("b").await.expect("should count rows"), 1);
}

#[tokio::test]
async fn empty_batch_handling() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .upsert("docs", Vec::new())
        .await
        .expect("should handle empty batch gracefully");

    assert_eq!(store.count("docs").await.expect("should count rows"), 0);
}

#[tokio::test]
async fn reopen_preserves_data() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("storage");

    {
        let store = LanceVectorStore::open(&path)
            .await
            .expect("should open vector store");
        store
            .upsert("docs", axis_records())
            .await
            .expect("should store embeddings successfully");
    }

    let store = LanceVectorStore::open(&path)
        .await
        .expect("should reopen vector store");
    assert_eq!(store.count("docs").await.expect("should count rows"), 3);
}
