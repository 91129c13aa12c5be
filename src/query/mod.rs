#[cfg(test)]
mod tests;

pub mod format;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{ChunkMetadata, VectorStore};
use crate::provider::{
    ChatMessage, ChatModel, Embedder, Reranker, chat_async, embed_async, rerank_async,
};
use crate::{RagError, Result};

pub use format::{OutputFormat, render};

/// Rerank keeps this many results when `top_n` is not configured
pub const DEFAULT_RERANK_TOP_N: usize = 5;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
provided context. If the context does not contain the answer, say that you do not know.";

/// Where a result's score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreKind {
    /// `1 - cosine distance` from the vector store
    #[default]
    Similarity,
    /// Relevance assigned by the reranker
    Relevance,
}

/// One chunk of context behind an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedResult {
    /// 1-based position in the final context
    pub rank: usize,
    pub score: f32,
    pub metadata: ChunkMetadata,
    pub text: String,
    #[serde(skip)]
    pub score_kind: ScoreKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: usize,
    pub rerank: bool,
    /// Defaults to `min(5, retrieved)` when unset
    pub top_n: Option<usize>,
}

impl QueryRequest {
    #[inline]
    pub fn from_config(config: &Config, question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: config.query.top_k,
            rerank: config.rerank.enabled,
            top_n: config.rerank.top_n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub contexts: Vec<RetrievedResult>,
}

/// Retrieve, optionally rerank, then synthesize an answer
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatModel>,
    reranker: Option<Arc<dyn Reranker>>,
    collection: String,
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatModel>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            reranker: None,
            collection: collection.into(),
        }
    }

    #[inline]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    #[inline]
    pub async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(RagError::Validation("Question must not be empty".to_string()));
        }

        let mut contexts = self.retrieve(question, request.top_k).await?;
        info!("Retrieved {} chunks", contexts.len());

        if request.rerank && !contexts.is_empty() {
            let top_n = request
                .top_n
                .unwrap_or_else(|| DEFAULT_RERANK_TOP_N.min(contexts.len()));
            contexts = self.rerank(question, &contexts, top_n).await?;
            info!("Rerank kept {} chunks", contexts.len());
        }

        let messages = build_messages(question, &contexts);
        let answer = chat_async(Arc::clone(&self.chat), messages).await?;

        Ok(AnswerResponse { answer, contexts })
    }

    /// The `top_k` nearest chunks, best first, scored by similarity
    #[inline]
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        let vectors = embed_async(Arc::clone(&self.embedder), vec![question.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            RagError::InvalidResponse("Embedder returned no vector for the question".to_string())
        })?;

        let mut hits = self.store.query(&self.collection, &vector, top_k).await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RetrievedResult {
                rank: i + 1,
                score: hit.score,
                metadata: hit.metadata,
                text: hit.text,
                score_kind: ScoreKind::Similarity,
            })
            .collect())
    }

    /// Replace `results` with the reranker's selection, in its order and
    /// carrying its relevance scores
    #[inline]
    pub async fn rerank(
        &self,
        question: &str,
        results: &[RetrievedResult],
        top_n: usize,
    ) -> Result<Vec<RetrievedResult>> {
        let reranker = self.reranker.as_ref().ok_or_else(|| {
            RagError::Validation("Rerank is enabled but no reranker is configured".to_string())
        })?;

        let documents: Vec<String> = results.iter().map(|result| result.text.clone()).collect();
        let hits = rerank_async(
            Arc::clone(reranker),
            question.to_string(),
            documents,
            top_n,
        )
        .await?;
        debug!("Reranker returned {} hits", hits.len());

        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let original = results.get(hit.index).ok_or_else(|| {
                    RagError::InvalidResponse(format!(
                        "Rerank index {} out of range for {} results",
                        hit.index,
                        results.len()
                    ))
                })?;

                Ok(RetrievedResult {
                    rank: i + 1,
                    score: hit.score,
                    metadata: original.metadata.clone(),
                    text: original.text.clone(),
                    score_kind: ScoreKind::Relevance,
                })
            })
            .collect()
    }
}

/// A system message plus one user message holding the context and question
#[inline]
pub fn build_messages(question: &str, contexts: &[RetrievedResult]) -> Vec<ChatMessage> {
    let context = contexts.iter().fold(String::new(), |mut context, result| {
        context.push_str("file_path: ");
        context.push_str(&result.metadata.file_path);
        context.push_str("\n\n");
        context.push_str(&result.text);
        context.push_str("\n\n");
        context
    });

    let user = format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, question
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}
