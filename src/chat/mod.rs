
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::provider::{ApiClient, ChatMessage, ChatModel, ProviderSettings, RetryPolicy};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ApiClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    #[inline]
    pub fn new(settings: ProviderSettings, model: impl Into<String>) -> Result<Self> {
        let client = ApiClient::new(settings)?;
        let model = model.into();

        info!("Chat client ready: {} (model {})", client.base_url(), model);

        Ok(Self { client, model })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(retry);
        self
    }
}

impl ChatModel for ChatClient {
    #[inline]
    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Sending {} chat messages to {}", messages.len(), self.model);

        let request = ChatRequest {
            model: &self.model,
            messages,
        };
        let response: ChatResponse = self.client.post_json("chat/completions", &request)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                RagError::InvalidResponse("Chat response contained no message content".to_string())
            })
    }
}
