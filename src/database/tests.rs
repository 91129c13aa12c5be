use super::*;
use serde_json::json;

#[test]
fn cosine_similarity_bounds() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_similarity_ignores_magnitude() {
    let a = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
    assert!((a - 1.0).abs() < 1e-6);
}

#[test]
fn zero_vector_has_zero_similarity() {
    assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
}

#[test]
fn metadata_serializes_flat() {
    let metadata = ChunkMetadata {
        document_id: "doc-1".to_string(),
        file_path: "data/notes.md".to_string(),
        file_name: "notes.md".to_string(),
        chunk_index: 2,
        token_count: 40,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };

    assert_eq!(
        serde_json::to_value(&metadata).expect("metadata should serialize"),
        json!({
            "document_id": "doc-1",
            "file_path": "data/notes.md",
            "file_name": "notes.md",
            "chunk_index": 2,
            "token_count": 40,
            "created_at": "2024-01-01T00:00:00Z"
        })
    );
}
