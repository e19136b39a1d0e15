//! Plain backend speaking the OpenAI chat-completions API

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::traits::BackendAdapter;
use crate::config::BackendConfig;
use crate::error::{ProviderError, Result};
use crate::relay::message::{BackendId, LabeledMessage, ProviderRole};

/// Chat message in the OpenAI wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ProviderRole,
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completion request (OpenAI compatible)
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Chat completion response, reduced to what the relay reads
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Sends the labeled context as-is
pub struct OpenAiBackend {
    id: BackendId,
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: Option<u32>,
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(id: BackendId, config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            id,
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: config.resolve_api_key(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    fn build_request(&self, messages: &[LabeledMessage]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl BackendAdapter for OpenAiBackend {
    fn backend(&self) -> BackendId {
        self.id
    }

    async fn call(&self, messages: &[LabeledMessage], timeout: Duration) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint);
        debug!(backend = %self.id, model = %self.model, messages = messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .timeout(timeout)
            .json(&self.build_request(messages))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::status(self.id, status.as_u16(), body));
        }

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            if e.is_timeout() {
                return ProviderError::timeout(self.id);
            }
            error!(backend = %self.id, error = %e, "Failed to parse chat completion response");
            ProviderError::malformed(self.id, format!("failed to parse response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::malformed(self.id, "response contained no message content"))
    }
}
