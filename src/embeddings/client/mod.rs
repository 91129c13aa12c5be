
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::truncate::Truncator;
use crate::provider::{ApiClient, Embedder, ProviderSettings, RetryPolicy};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: ApiClient,
    model: String,
    truncator: Truncator,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(settings: ProviderSettings, model: impl Into<String>, truncator: Truncator) -> Result<Self> {
        let client = ApiClient::new(settings)?;
        let model = model.into();

        info!(
            "Embedding client ready: {} (model {})",
            client.base_url(),
            model
        );

        Ok(Self {
            client,
            model,
            truncator,
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(retry);
        self
    }
}

impl Embedder for EmbeddingClient {
    #[inline]
    fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} inputs", batch.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: batch.iter().map(|text| self.truncator.truncate(text)).collect(),
        };
        let response: EmbeddingResponse = self.client.post_json("embeddings", &request)?;

        order_by_index(response.data, batch.len())
    }
}

/// Put provider results back into input order
fn order_by_index(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(RagError::InvalidResponse(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|item| item.index);

    if let Some((position, item)) = data
        .iter()
        .enumerate()
        .find(|(position, item)| item.index != *position)
    {
        return Err(RagError::InvalidResponse(format!(
            "Embedding indices are not 0..{}: found index {} at position {}",
            expected, item.index, position
        )));
    }

    Ok(data.into_iter().map(|item| item.embedding).collect())
}
