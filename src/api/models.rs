//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::relay::message::{Message, Reply};
use crate::relay::SendOutcome;

/// Replies produced for one send request, in tag order
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub ok: bool,
    /// Id of the stored user message
    pub user_message_id: String,
    pub replies: Vec<Reply>,
}

impl From<SendOutcome> for SendResponse {
    fn from(outcome: SendOutcome) -> Self {
        Self {
            ok: true,
            user_message_id: outcome.user_message_id,
            replies: outcome.replies,
        }
    }
}

/// Full conversation history
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ResetResponse {
    pub ok: bool,
}

/// Liveness payload
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
    /// Backends that can be selected with `@<name>`
    pub backends: Vec<String>,
}
