// Provider module
// Capability traits for the remote AI provider plus shared HTTP plumbing

pub mod http;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::{RagError, Result};

pub use http::{ApiClient, RetryPolicy};

/// Connection settings for an OpenAI-compatible provider.
///
/// Built once from configuration and handed by value to each client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One document's position in the caller's list and its relevance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub score: f32,
}

/// Converts text batches into embedding vectors.
///
/// Output has the same length and order as `batch`.
pub trait Embedder: Send + Sync {
    fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces a single completion for a role-tagged conversation
pub trait ChatModel: Send + Sync {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Scores documents against a query.
///
/// Output holds at most `min(top_n, documents.len())` hits ordered by
/// non-increasing score.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>>;
}

/// Run a blocking provider call on tokio's blocking pool.
///
/// The call itself is unchanged; only the thread it runs on moves, so the
/// async caller is not stalled while the request is in flight.
#[inline]
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Blocking provider task failed: {}", e)))?
}

#[inline]
pub async fn embed_async(embedder: Arc<dyn Embedder>, batch: Vec<String>) -> Result<Vec<Vec<f32>>> {
    run_blocking(move || embedder.embed(&batch)).await
}

#[inline]
pub async fn chat_async(chat: Arc<dyn ChatModel>, messages: Vec<ChatMessage>) -> Result<String> {
    run_blocking(move || chat.chat(&messages)).await
}

#[inline]
pub async fn rerank_async(
    reranker: Arc<dyn Reranker>,
    query: String,
    documents: Vec<String>,
    top_n: usize,
) -> Result<Vec<RerankHit>> {
    run_blocking(move || reranker.rerank(&query, &documents, top_n)).await
}

/// Chat presented as a stream, for callers that consume completions that way.
///
/// This is not incremental delivery: the provider is called once without
/// streaming and the finished completion is yielded as the only item.
#[inline]
pub fn chat_stream(
    chat: Arc<dyn ChatModel>,
    messages: Vec<ChatMessage>,
) -> BoxStream<'static, Result<String>> {
    stream::once(chat_async(chat, messages)).boxed()
}
