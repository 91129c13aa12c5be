
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::provider::{ApiClient, ProviderSettings, RerankHit, Reranker, RetryPolicy};
use crate::{RagError, Result};

/// Client for a `/rerank` endpoint in the Cohere/Jina style served by
/// OpenAI-compatible gateways
#[derive(Debug, Clone)]
pub struct RerankClient {
    client: ApiClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: Option<f32>,
    #[serde(default)]
    score: Option<f32>,
}

impl RerankResult {
    fn score(&self) -> f32 {
        self.relevance_score.or(self.score).unwrap_or(0.0)
    }
}

impl RerankClient {
    #[inline]
    pub fn new(settings: ProviderSettings, model: impl Into<String>) -> Result<Self> {
        let client = ApiClient::new(settings)?;
        let model = model.into();

        info!("Rerank client ready: {} (model {})", client.base_url(), model);

        Ok(Self { client, model })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(retry);
        self
    }
}

impl Reranker for RerankClient {
    #[inline]
    fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let top_n = top_n.min(documents.len());
        debug!(
            "Reranking {} documents, keeping top {}",
            documents.len(),
            top_n
        );

        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
        };
        let response: RerankResponse = self.client.post_json("rerank", &request)?;

        let mut hits = response
            .results
            .iter()
            .map(|result| {
                if result.index >= documents.len() {
                    return Err(RagError::InvalidResponse(format!(
                        "Rerank index {} out of range for {} documents",
                        result.index,
                        documents.len()
                    )));
                }
                Ok(RerankHit {
                    index: result.index,
                    score: result.score(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Stable sort, so the first hit seen per index is its best one
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut seen = HashSet::new();
        hits.retain(|hit| seen.insert(hit.index));
        hits.truncate(top_n);

        Ok(hits)
    }
}
