use super::*;
use crate::database::ChunkMetadata;

fn record(id: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        vector,
        text: format!("chunk {}", id),
        metadata: ChunkMetadata {
            document_id: "doc".to_string(),
            file_path: "data/doc.txt".to_string(),
            file_name: "doc.txt".to_string(),
            chunk_index: 0,
            token_count: 2,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn query_returns_nearest_first() {
    let store = InMemoryVectorStore::new();
    store
        .upsert(
            "docs",
            vec![
                record("a", vec![1.0, 0.0]),
                record("b", vec![0.0, 1.0]),
                record("c", vec![0.8, 0.2]),
            ],
        )
        .await
        .expect("upsert should succeed");

    let results = store
        .query("docs", &[1.0, 0.0], 2)
        .await
        .expect("query should succeed");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn upsert_replaces_by_id() {
    let store = InMemoryVectorStore::new();
    store
        .upsert("docs", vec![record("a", vec![1.0, 0.0])])
        .await
        .expect("upsert should succeed");
    store
        .upsert("docs", vec![record("a", vec![0.0, 1.0])])
        .await
        .expect("upsert should succeed");

    assert_eq!(store.count("docs").await.expect("count should succeed"), 1);
    let results = store
        .query("docs", &[0.0, 1.0], 1)
        .await
        .expect("query should succeed");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn missing_collection_behaviour() {
    let store = InMemoryVectorStore::new();

    assert!(
        store
            .query("absent", &[1.0], 3)
            .await
            .expect("query should succeed")
            .is_empty()
    );
    assert_eq!(store.count("absent").await.expect("count should succeed"), 0);
    assert!(
        !store
            .delete_collection("absent")
            .await
            .expect("delete should succeed")
    );
}

#[tokio::test]
async fn dimension_mismatch_rejected_without_side_effects() {
    let store = InMemoryVectorStore::new();

    let result = store
        .upsert(
            "docs",
            vec![record("a", vec![1.0, 0.0]), record("b", vec![1.0])],
        )
        .await;
    assert!(matches!(result, Err(RagError::Database(_))));
    assert!(
        !store
            .delete_collection("docs")
            .await
            .expect("delete should succeed")
    );
}

#[tokio::test]
async fn delete_removes_collection() {
    let store = InMemoryVectorStore::new();
    store
        .upsert("docs", vec![record("a", vec![1.0])])
        .await
        .expect("upsert should succeed");

    assert!(
        store
            .delete_collection("docs")
            .await
            .expect("delete should succeed")
    );
    assert_eq!(store.count("docs").await.expect("count should succeed"), 0);
}
