// In-memory vector store using cosine similarity
// Used for tests and for running pipelines without touching disk

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{EmbeddingRecord, SearchResult, VectorStore, cosine_similarity};
use crate::{RagError, Result};

/// Collections are stored as nested maps: collection name → record id → record
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, EmbeddingRecord>>>,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    #[inline]
    async fn upsert(&self, collection: &str, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;

        let expected = collections
            .get(collection)
            .and_then(|store| store.values().next())
            .or_else(|| records.first())
            .map(|record| record.vector.len());
        if let Some(record) = records
            .iter()
            .find(|record| Some(record.vector.len()) != expected)
        {
            return Err(RagError::Database(format!(
                "Record {} has dimension {}, collection {} expects {:?}",
                record.id,
                record.vector.len(),
                collection,
                expected
            )));
        }

        let store = collections.entry(collection.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record);
        }
        Ok(())
    }

    #[inline]
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<SearchResult> = store
            .values()
            .map(|record| SearchResult {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(&record.vector, vector),
            })
            .collect();

        // Ties broken by id so results do not depend on map order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(top_k);
        Ok(scored)
    }

    #[inline]
    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections.remove(collection).is_some())
    }

    #[inline]
    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, HashMap::len))
    }
}
