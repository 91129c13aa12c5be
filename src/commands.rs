use std::sync::Arc;
use tracing::info;

use crate::Result;
use crate::chat::ChatClient;
use crate::config::Config;
use crate::database::LanceVectorStore;
use crate::embeddings::{EmbeddingClient, Truncator};
use crate::ingest::{IngestOptions, IngestPipeline, IngestStats};
use crate::query::{OutputFormat, QueryPipeline, QueryRequest, render};
use crate::rerank::RerankClient;

fn embedding_client(config: &Config) -> Result<EmbeddingClient> {
    let truncator = Truncator::from_tokenizer_file(
        config.embedding.tokenizer_path.as_deref(),
        config.embedding.max_tokens_per_input,
    );
    EmbeddingClient::new(
        config.provider_settings()?,
        config.embedding.model.as_str(),
        truncator,
    )
}

/// Build the ingest pipeline against the configured provider and store
#[inline]
pub async fn build_ingest_pipeline(config: &Config) -> Result<IngestPipeline> {
    let embedder = embedding_client(config)?;
    let store = LanceVectorStore::open(&config.vector_store.persist_dir).await?;
    let options = IngestOptions::from_config(config)?;

    Ok(IngestPipeline::new(
        Arc::new(embedder),
        Arc::new(store),
        options,
    ))
}

/// Build the query pipeline, attaching a reranker only when rerank is enabled
#[inline]
pub async fn build_query_pipeline(config: &Config) -> Result<QueryPipeline> {
    let settings = config.provider_settings()?;
    let embedder = embedding_client(config)?;
    let chat = ChatClient::new(settings.clone(), config.llm.model.as_str())?;
    let store = LanceVectorStore::open(&config.vector_store.persist_dir).await?;

    let mut pipeline = QueryPipeline::new(
        Arc::new(embedder),
        Arc::new(store),
        Arc::new(chat),
        config.vector_store.collection.as_str(),
    );

    if config.rerank.enabled {
        let reranker = RerankClient::new(settings, config.rerank.model.as_str())?;
        pipeline = pipeline.with_reranker(Arc::new(reranker));
    }

    Ok(pipeline)
}

/// Ingest the configured data directory and report the result
#[inline]
pub async fn run_ingest(config: &Config, rebuild: bool) -> Result<IngestStats> {
    if rebuild {
        info!(
            "Rebuilding collection {}",
            config.vector_store.collection
        );
    }

    let stats = build_ingest_pipeline(config).await?.run(rebuild).await?;

    println!(
        "[ingest] ok | store=lancedb dir={} collection={} | docs={}",
        config.vector_store.persist_dir.display(),
        config.vector_store.collection,
        stats.documents
    );
    println!("  Chunks indexed: {}", stats.chunks);

    Ok(stats)
}

/// Answer a question and render it in the requested format
#[inline]
pub async fn run_ask(config: &Config, question: &str, format: OutputFormat) -> Result<String> {
    let pipeline = build_query_pipeline(config).await?;
    let request = QueryRequest::from_config(config, question);
    let response = pipeline.ask(&request).await?;

    render(&response, format)
}
