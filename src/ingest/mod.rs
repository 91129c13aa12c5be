
use chrono::Utc;
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::database::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, TextChunk, chunk_text};
use crate::provider::{Embedder, embed_async};
use crate::{RagError, Result};

/// A source file loaded for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Derived from the path, so re-ingesting a file yields the same id
    pub id: String,
    pub path: PathBuf,
    pub text: String,
}

/// Everything an ingest run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub data_dir: PathBuf,
    pub recursive: bool,
    pub collection: String,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub include: Vec<Pattern>,
    pub exclude: Vec<Pattern>,
}

impl IngestOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            data_dir: config.paths.data_dir.clone(),
            recursive: config.paths.recursive,
            collection: config.vector_store.collection.clone(),
            chunking: config.ingest.chunking_config(),
            batch_size: config.embedding.batch_size,
            include: config.ingest.include_patterns()?,
            exclude: config.ingest.exclude_patterns()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Files → chunks → vectors → collection
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
}

impl IngestPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    /// Ingest every selected document, replacing the collection first when
    /// `rebuild` is set
    #[inline]
    pub async fn run(&self, rebuild: bool) -> Result<IngestStats> {
        let options = &self.options;
        info!(
            "Ingesting {} into collection {}",
            options.data_dir.display(),
            options.collection
        );

        let candidates = enumerate_files(&options.data_dir, options.recursive)?;
        let selected = filter_files(candidates, &options.include, &options.exclude);
        if selected.is_empty() {
            return Err(RagError::NoDocuments(options.data_dir.clone()));
        }

        let documents = selected
            .iter()
            .map(|path| load_document(path))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} documents", documents.len());

        let records = self.embed_documents(&documents).await?;

        if rebuild {
            if self.store.delete_collection(&options.collection).await? {
                info!("Deleted existing collection {}", options.collection);
            } else {
                debug!(
                    "Collection {} did not exist, nothing to rebuild",
                    options.collection
                );
            }
        }

        let stats = IngestStats {
            documents: documents.len(),
            chunks: records.len(),
        };
        self.store.upsert(&options.collection, records).await?;

        info!(
            "Ingested {} documents as {} chunks",
            stats.documents, stats.chunks
        );
        Ok(stats)
    }

    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<EmbeddingRecord>> {
        let created_at = Utc::now().to_rfc3339();
        let pending: Vec<(&Document, TextChunk)> = documents
            .iter()
            .flat_map(|document| {
                chunk_text(&document.text, &self.options.chunking)
                    .into_iter()
                    .map(move |chunk| (document, chunk))
            })
            .collect();

        debug!("Embedding {} chunks", pending.len());
        let bar = progress_bar(pending.len());
        let mut records = Vec::with_capacity(pending.len());

        for batch in pending.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(_, chunk)| chunk.text.clone()).collect();
            let vectors = embed_async(Arc::clone(&self.embedder), texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::InvalidResponse(format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            for ((document, chunk), vector) in batch.iter().zip(vectors) {
                records.push(build_record(document, chunk, vector, &created_at));
            }
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        Ok(records)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if console::user_attended_stderr() {
        match ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}") {
            Ok(style) => ProgressBar::new(len as u64).with_style(style),
            Err(_) => ProgressBar::new(len as u64),
        }
    } else {
        ProgressBar::hidden()
    }
}

fn build_record(
    document: &Document,
    chunk: &TextChunk,
    vector: Vec<f32>,
    created_at: &str,
) -> EmbeddingRecord {
    let file_path = document.path.to_string_lossy().into_owned();
    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("{}#{}", file_path, chunk.chunk_index).as_bytes(),
    );

    EmbeddingRecord {
        id: id.to_string(),
        vector,
        text: chunk.text.clone(),
        metadata: ChunkMetadata {
            document_id: document.id.clone(),
            file_name: document
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path,
            chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
            token_count: u32::try_from(chunk.token_count).unwrap_or(u32::MAX),
            created_at: created_at.to_string(),
        },
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Regular files under `root` in sorted order, skipping hidden entries
#[inline]
pub fn enumerate_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
    {
        let entry = entry.map_err(|e| RagError::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!("Found {} candidate files under {}", files.len(), root.display());
    Ok(files)
}

/// Keep files matching any include pattern (all files when there are none),
/// then drop files matching any exclude pattern
#[inline]
pub fn filter_files(files: Vec<PathBuf>, include: &[Pattern], exclude: &[Pattern]) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|path| {
            let path_str = path.to_string_lossy();
            let included =
                include.is_empty() || include.iter().any(|pattern| pattern.matches(&path_str));
            let excluded = exclude.iter().any(|pattern| pattern.matches(&path_str));
            included && !excluded
        })
        .collect()
}

/// Read a file as text, replacing invalid UTF-8
#[inline]
pub fn load_document(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "{} is not valid UTF-8, invalid bytes were replaced",
                path.display()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes());
    Ok(Document {
        id: id.to_string(),
        path: path.to_path_buf(),
        text,
    })
}
