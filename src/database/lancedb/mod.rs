// LanceDB vector database module
// Arrow schema and record conversion for one table per collection


pub mod vector_store;

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use super::{ChunkMetadata, EmbeddingRecord, SearchResult};
use crate::{RagError, Result};

pub use vector_store::LanceVectorStore;

const DISTANCE_COLUMN: &str = "_distance";

/// Create schema with the specified vector dimension
pub(crate) fn create_schema(vector_dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("token_count", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// Vector dimension of a table schema, if it has a vector column
pub(crate) fn schema_vector_dimension(schema: &Schema) -> Option<i32> {
    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => Some(*size),
            _ => None,
        })
}

/// Vector dimension shared by every record, or a database error
pub(crate) fn records_dimension(records: &[EmbeddingRecord]) -> Result<i32> {
    let first = records
        .first()
        .map(|record| record.vector.len())
        .ok_or_else(|| RagError::Database("No records to store".to_string()))?;

    if first == 0 {
        return Err(RagError::Database("Embedding vectors must not be empty".to_string()));
    }
    if let Some(record) = records.iter().find(|record| record.vector.len() != first) {
        return Err(RagError::Database(format!(
            "Record {} has dimension {}, expected {}",
            record.id,
            record.vector.len(),
            first
        )));
    }

    i32::try_from(first)
        .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", first)))
}

/// Create a RecordBatch from embedding records
pub(crate) fn create_record_batch(records: &[EmbeddingRecord]) -> Result<RecordBatch> {
    let vector_dim = records_dimension(records)?;
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut texts = Vec::with_capacity(len);
    let mut document_ids = Vec::with_capacity(len);
    let mut file_paths = Vec::with_capacity(len);
    let mut file_names = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut token_counts = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(records.iter().map(|r| r.vector.len()).sum());

    for record in records {
        ids.push(record.id.as_str());
        texts.push(record.text.as_str());
        document_ids.push(record.metadata.document_id.as_str());
        file_paths.push(record.metadata.file_path.as_str());
        file_names.push(record.metadata.file_name.as_str());
        chunk_indices.push(record.metadata.chunk_index);
        token_counts.push(record.metadata.token_count);
        created_ats.push(record.metadata.created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let schema = create_schema(vector_dim);

    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        vector_dim,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(document_ids)),
        Arc::new(StringArray::from(file_paths)),
        Arc::new(StringArray::from(file_names)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt32Array::from(token_counts)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
pub(crate) fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let document_ids = string_column(batch, "document_id")?;
    let file_paths = string_column(batch, "file_path")?;
    let file_names = string_column(batch, "file_name")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let token_counts = u32_column(batch, "token_count")?;
    let created_ats = string_column(batch, "created_at")?;

    // Extract distance scores if available
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                id: ids.value(row).to_string(),
                text: texts.value(row).to_string(),
                metadata: ChunkMetadata {
                    document_id: document_ids.value(row).to_string(),
                    file_path: file_paths.value(row).to_string(),
                    file_name: file_names.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    token_count: token_counts.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                // Cosine distance to similarity (higher is better)
                score: 1.0 - distance,
            }
        })
        .collect();

    Ok(results)
}
