#[cfg(test)]
mod tests;

use arrow::record_batch::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{create_record_batch, parse_search_batch, records_dimension, schema_vector_dimension};
use crate::database::{EmbeddingRecord, SearchResult, VectorStore};
use crate::{RagError, Result};

/// Vector database store using LanceDB, one table per collection
pub struct LanceVectorStore {
    connection: Connection,
    persist_dir: PathBuf,
}

impl std::fmt::Debug for LanceVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceVectorStore")
            .field("persist_dir", &self.persist_dir)
            .finish_non_exhaustive()
    }
}

impl LanceVectorStore {
    /// Open (creating if needed) the LanceDB database in `persist_dir`
    #[inline]
    pub async fn open(persist_dir: impl AsRef<Path>) -> Result<Self> {
        let persist_dir = persist_dir.as_ref().to_path_buf();
        debug!("Initializing LanceDB at path: {}", persist_dir.display());

        std::fs::create_dir_all(&persist_dir).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = persist_dir.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened at {}", persist_dir.display());
        Ok(Self {
            connection,
            persist_dir,
        })
    }

    #[inline]
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    async fn table_exists(&self, collection: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == collection))
    }

    async fn open_table(&self, collection: &str) -> Result<Option<Table>> {
        if !self.table_exists(collection).await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table {}: {}", collection, e)))?;

        Ok(Some(table))
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    #[inline]
    async fn upsert(&self, collection: &str, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        debug!(
            "Storing batch of {} embeddings in {}",
            records.len(),
            collection
        );

        let vector_dim = records_dimension(&records)?;
        let record_batch = create_record_batch(&records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        match self.open_table(collection).await? {
            Some(table) => {
                let table_schema = table
                    .schema()
                    .await
                    .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

                let existing_dim = schema_vector_dimension(&table_schema);
                if existing_dim != Some(vector_dim) {
                    return Err(RagError::Database(format!(
                        "Collection {} stores vectors of dimension {:?}, got {}",
                        collection, existing_dim, vector_dim
                    )));
                }

                let mut merge = table.merge_insert(&["id"]);
                merge
                    .when_matched_update_all(None)
                    .when_not_matched_insert_all();
                merge.execute(Box::new(reader)).await.map_err(|e| {
                    RagError::Database(format!("Failed to upsert embeddings: {}", e))
                })?;
            }
            None => {
                info!(
                    "Creating collection {} with {} dimensions",
                    collection, vector_dim
                );
                self.connection
                    .create_table(collection, reader)
                    .execute()
                    .await
                    .map_err(|e| {
                        RagError::Database(format!("Failed to create table {}: {}", collection, e))
                    })?;
            }
        }

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    #[inline]
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!("Searching {} for {} nearest vectors", collection, top_k);

        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_table(collection).await? else {
            debug!("Collection {} does not exist, no results", collection);
            return Ok(Vec::new());
        };

        let mut results = table
            .vector_search(vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        search_results.sort_by(|a, b| b.score.total_cmp(&a.score));
        search_results.truncate(top_k);

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    #[inline]
    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        if !self.table_exists(collection).await? {
            debug!("Collection {} not found, nothing to delete", collection);
            return Ok(false);
        }

        info!("Dropping collection {}", collection);
        self.connection
            .drop_table(collection)
            .await
            .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;

        Ok(true)
    }

    #[inline]
    async fn count(&self, collection: &str) -> Result<usize> {
        let Some(table) = self.open_table(collection).await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }
}
