//! Sequential multi-backend dispatch over the shared history

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::backend::registry::BackendRegistry;
use crate::backend::traits::BackendAdapter;
use crate::error::{AppError, Result};
use crate::relay::history::HistoryStore;
use crate::relay::labeler::{label_history, label_message};
use crate::relay::message::{Author, BackendId, LabeledMessage, Reply, Role, Tag};
use crate::relay::retry::RetryPolicy;

/// A user turn and the backends that should answer it, in order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendRequest {
    pub content: String,
    #[schema(value_type = Vec<String>, example = json!(["@gpt", "@claude"]))]
    pub tags: Vec<Tag>,
}

/// Result of one dispatch: the stored user message and one reply per tag
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub user_message_id: String,
    pub replies: Vec<Reply>,
}

pub struct Dispatcher {
    history: Arc<HistoryStore>,
    registry: Arc<BackendRegistry>,
    retry: RetryPolicy,
    system_prompt: Option<String>,
}

impl Dispatcher {
    pub fn new(history: Arc<HistoryStore>, registry: Arc<BackendRegistry>, retry: RetryPolicy) -> Self {
        Self {
            history,
            registry,
            retry,
            system_prompt: None,
        }
    }

    /// Lead every outbound context with a system message
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Record the user turn, then ask each tagged backend in order.
    ///
    /// Only validation fails the call. Backend failures become inline error
    /// replies and are recorded like any other reply.
    ///
    /// No lock is held across backend calls, so writes from concurrent sends
    /// may interleave. Each request's own writes keep their relative order.
    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome> {
        let (content, adapters) = self.validate(&request)?;

        let user = self.history.record(Author::User, Role::User, content);
        info!(message_id = %user.id, backends = adapters.len(), "Dispatching user message");

        let mut context = self.initial_context();
        let mut replies = Vec::with_capacity(adapters.len());

        for (id, adapter) in adapters {
            let text = match self
                .retry
                .attempt(id, |timeout| adapter.call(&context, timeout))
                .await
            {
                Ok(text) => {
                    info!(backend = %id, "Backend replied");
                    text
                }
                Err(failure) => {
                    warn!(backend = %id, attempts = failure.attempts, error = %failure, "Backend failed, recording error reply");
                    failure.to_string()
                }
            };

            let message = self.history.record(Author::from(id), Role::Assistant, text);
            context.push(label_message(&message));
            replies.push(Reply::from(&message));
        }

        Ok(SendOutcome {
            user_message_id: user.id,
            replies,
        })
    }

    /// Reject the request before touching history, resolving every adapter up front
    fn validate<'a>(&self, request: &'a SendRequest) -> Result<(&'a str, Vec<(BackendId, Arc<dyn BackendAdapter>)>)> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Content cannot be empty".to_string()));
        }
        if request.tags.is_empty() {
            return Err(AppError::Validation("At least one tag must be selected".to_string()));
        }

        let adapters = request
            .tags
            .iter()
            .map(|tag| {
                let id = tag.backend();
                self.registry
                    .get(id)
                    .map(|adapter| (id, adapter))
                    .ok_or_else(|| AppError::Validation(format!("Backend '@{}' is not configured", id)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((content, adapters))
    }

    fn initial_context(&self) -> Vec<LabeledMessage> {
        let snapshot = self.history.snapshot();
        let mut context = Vec::with_capacity(snapshot.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            context.push(LabeledMessage::system(prompt.clone()));
        }
        context.extend(label_history(&snapshot));
        context
    }
}
