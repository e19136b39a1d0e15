//! Alternation-sensitive backend speaking the Anthropic messages API

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::traits::{RoleMappedBackend, RoleMapping};
use crate::config::BackendConfig;
use crate::error::{ProviderError, Result};
use crate::relay::labeler::parse_speaker;
use crate::relay::message::{BackendId, LabeledMessage, ProviderRole};

const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Message in the Anthropic wire format; only user and assistant are allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    pub role: ProviderRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Split system content into its own field, keep every other role as-is
pub fn faithful_mapping(messages: &[LabeledMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = Vec::new();
    let mut mapped = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            ProviderRole::System => system.push(message.content.as_str()),
            role => mapped.push(AnthropicMessage {
                role,
                content: message.content.clone(),
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, mapped)
}

/// Drop system content and send peer assistant turns as user turns.
///
/// `own_label` is this backend's speaker tag; assistant turns carrying it
/// stay assistant turns.
pub fn compat_mapping(own_label: &str, messages: &[LabeledMessage]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .filter(|m| m.role != ProviderRole::System)
        .map(|m| {
            let from_peer = m.role == ProviderRole::Assistant
                && parse_speaker(&m.content).map_or(false, |speaker| speaker != own_label);
            AnthropicMessage {
                role: if from_peer { ProviderRole::User } else { m.role },
                content: m.content.clone(),
            }
        })
        .collect()
}

pub struct AnthropicBackend {
    id: BackendId,
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    api_key: Option<String>,
}

impl AnthropicBackend {
    pub fn new(id: BackendId, config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            id,
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            api_version: config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_key: config.resolve_api_key(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Ok(version) = HeaderValue::from_str(&self.api_version) {
            headers.insert(HeaderName::from_static("anthropic-version"), version);
        }
        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert(HeaderName::from_static("x-api-key"), value);
            }
        }

        headers
    }

    pub fn build_request(&self, mapping: RoleMapping, messages: &[LabeledMessage]) -> MessagesRequest {
        let (system, messages) = match mapping {
            RoleMapping::Faithful => faithful_mapping(messages),
            RoleMapping::Compat => {
                let own_label = self.id.as_str().to_uppercase();
                (None, compat_mapping(&own_label, messages))
            }
        };

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages,
        }
    }
}

#[async_trait]
impl RoleMappedBackend for AnthropicBackend {
    fn backend(&self) -> BackendId {
        self.id
    }

    async fn call_mapped(
        &self,
        mapping: RoleMapping,
        messages: &[LabeledMessage],
        timeout: Duration,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/messages", self.endpoint);
        let request = self.build_request(mapping, messages);
        debug!(
            backend = %self.id,
            model = %self.model,
            mapping = ?mapping,
            messages = request.messages.len(),
            "Sending messages request"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::status(self.id, status.as_u16(), body));
        }

        let parsed = response.json::<MessagesResponse>().await.map_err(|e| {
            if e.is_timeout() {
                return ProviderError::timeout(self.id);
            }
            error!(backend = %self.id, error = %e, "Failed to parse messages response");
            ProviderError::malformed(self.id, format!("failed to parse response: {}", e))
        })?;

        parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| ProviderError::malformed(self.id, "response contained no text block"))
    }
}
