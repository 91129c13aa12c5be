// Database module
// Vector storage for embedded chunks: LanceDB on disk, plus an in-memory store

#[cfg(test)]
mod tests;

pub mod lancedb;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use self::lancedb::LanceVectorStore;
pub use memory::InMemoryVectorStore;

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Stable identifier of the source document
    pub document_id: String,
    /// Path of the source file as it was enumerated
    pub file_path: String,
    pub file_name: String,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// Estimated token count of the chunk
    pub token_count: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

/// Embedding record stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding; re-ingesting a chunk reuses it
    pub id: String,
    pub vector: Vec<f32>,
    /// Chunk text
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Similarity in `1 - cosine distance` terms, higher is better
    pub score: f32,
}

/// Named collections of embedding records with nearest-neighbour search.
///
/// A collection is created by its first upsert. Every record in a collection
/// has the same vector dimension; an upsert that disagrees is rejected.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any existing record with the same id
    async fn upsert(&self, collection: &str, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// The `top_k` records nearest to `vector`, best first.
    ///
    /// A collection that does not exist yields no results.
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize)
    -> Result<Vec<SearchResult>>;

    /// Remove a collection. Returns `false` when it did not exist.
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    /// Number of records in a collection; zero when it does not exist
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
