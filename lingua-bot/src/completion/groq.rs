//! Groq chat completions provider.
//!
//! Talks to Groq's OpenAI-compatible `/chat/completions` endpoint.

use super::provider::{ChatMessage, CompletionProvider};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default Groq API base URL.
pub const GROQ_API_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Groq API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GroqClient {
    http_client: reqwest::Client,
    api_key: Option<Arc<str>>,
    base_url: Arc<str>,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> GroqClientBuilder {
        GroqClientBuilder::default()
    }

    /// Get the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn get_api_key(&self) -> ProviderResult<&str> {
        self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> ProviderResult<String> {
        let api_key = self.get_api_key()?;

        debug!("sending chat completion request");

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&CompletionRequest { model, messages })
            .send()
            .await
            .map_err(|e| ProviderError::request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::malformed("response has no completion text"))?;

        info!(text_len = text.len(), "chat completion received");
        Ok(text)
    }
}

/// Builder for [`GroqClient`].
#[derive(Debug, Default)]
pub struct GroqClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl GroqClientBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the API key if one is present.
    #[must_use]
    pub fn maybe_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout in seconds. Default is no timeout.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: Option<u64>) -> Self {
        self.timeout_secs = timeout;
        self
    }

    /// Build the client.
    ///
    /// A client without an API key is valid; every request it makes fails
    /// with [`ProviderError::MissingApiKey`].
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Request`] if the HTTP client cannot be built.
    pub fn build(self) -> ProviderResult<GroqClient> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let http_client = builder
            .build()
            .map_err(|e| ProviderError::request(format!("failed to build HTTP client: {e}")))?;

        Ok(GroqClient {
            http_client,
            api_key: self.api_key.filter(|k| !k.is_empty()).map(Into::into),
            base_url: self
                .base_url
                .unwrap_or_else(|| GROQ_API_BASE_URL.to_string())
                .into(),
        })
    }
}
