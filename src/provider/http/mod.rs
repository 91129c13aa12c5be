
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::ProviderSettings;
use crate::{RagError, Result};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const ERROR_BODY_LIMIT: usize = 400;

/// Attempt budget shared by every provider endpoint.
///
/// Only transport failures and 5xx responses are retried. A 4xx response
/// fails on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Blocking JSON client for an OpenAI-compatible API with Bearer auth
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

enum AttemptError {
    Transport(String),
    Status { status: u16, body: String },
    Fatal(String),
}

impl ApiClient {
    /// Fails with [`RagError::Auth`] when the settings carry no API key
    #[inline]
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::Auth("API key is not set".to_string()));
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            agent,
            retry: RetryPolicy::default(),
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// POST `body` as JSON to `{base_url}/{path}` and decode the JSON reply
    #[inline]
    pub fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request_json = serde_json::to_string(body)?;

        let response_text = self.send_with_retry(&url, &request_json)?;

        serde_json::from_str(&response_text).map_err(|e| {
            RagError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    fn send_with_retry(&self, url: &str, request_json: &str) -> Result<String> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!("POST {} attempt {}/{}", url, attempt, max_attempts);

            match self.send_once(url, request_json) {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(AttemptError::Status { status, body }) if status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, max_attempts
                    );
                    last_error = Some(RagError::Api { status, body });
                }
                Err(AttemptError::Status { status, body }) => {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(RagError::Api { status, body });
                }
                Err(AttemptError::Transport(message)) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        message, attempt, max_attempts
                    );
                    last_error = Some(RagError::Transport {
                        attempts: attempt,
                        message,
                    });
                }
                Err(AttemptError::Fatal(message)) => {
                    warn!("Non-retryable error: {}", message);
                    return Err(RagError::Transport {
                        attempts: attempt,
                        message,
                    });
                }
            }

            if attempt < max_attempts {
                let delay = self.retry.delay_after(attempt);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error.unwrap_or_else(|| RagError::Transport {
            attempts: max_attempts,
            message: "Request failed after retries".to_string(),
        }))
    }

    fn send_once(
        &self,
        url: &str,
        request_json: &str,
    ) -> std::result::Result<String, AttemptError> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(request_json);

        match response {
            Ok(mut response) => {
                let status = response.status().as_u16();
                if (200..300).contains(&status) {
                    response
                        .body_mut()
                        .read_to_string()
                        .map_err(classify_transport_error)
                } else {
                    let body = response.body_mut().read_to_string().unwrap_or_default();
                    Err(AttemptError::Status {
                        status,
                        body: truncate_body(&body),
                    })
                }
            }
            Err(ureq::Error::StatusCode(status)) => Err(AttemptError::Status {
                status,
                body: String::new(),
            }),
            Err(e) => Err(classify_transport_error(e)),
        }
    }
}

fn classify_transport_error(error: ureq::Error) -> AttemptError {
    match error {
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => AttemptError::Transport(error.to_string()),
        other => AttemptError::Fatal(other.to_string()),
    }
}

/// First 400 characters of an error body
fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
