//! HTTP request handlers

use crate::api::models::{HistoryResponse, ResetResponse, SendResponse, ServiceInfo};
use crate::error::AppError;
use crate::relay::SendRequest;
use crate::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;
use tracing::info;

/// Service info and available endpoints
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "Service is running", body = ServiceInfo))
)]
pub async fn root(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Chat API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec!["/history".to_string(), "/send".to_string(), "/reset".to_string()],
        backends: state
            .registry
            .list()
            .into_iter()
            .map(|id| format!("@{}", id))
            .collect(),
    })
}

/// Get the shared conversation history
#[utoipa::path(
    get,
    path = "/history",
    tag = "Chat",
    responses((status = 200, description = "Conversation so far", body = HistoryResponse))
)]
pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.history.snapshot(),
    })
}

/// Send a message and collect replies from the tagged backends
#[utoipa::path(
    post,
    path = "/send",
    tag = "Chat",
    request_body = SendRequest,
    responses(
        (status = 200, description = "One reply per tag, in tag order", body = SendResponse),
        (status = 400, description = "Empty content, no tags or unknown backend", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    info!(tags = request.tags.len(), content_len = request.content.len(), "Received send request");

    // Backend calls must outlive a client disconnect.
    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::spawn(async move { dispatcher.send(request).await })
        .await
        .map_err(|e| AppError::Internal(format!("Dispatch task failed: {}", e)))??;

    info!(replies = outcome.replies.len(), "Send request completed");
    Ok(Json(outcome.into()))
}

/// Clear the conversation history
#[utoipa::path(
    post,
    path = "/reset",
    tag = "Chat",
    responses((status = 200, description = "History cleared", body = ResetResponse))
)]
pub async fn reset_chat(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.history.reset();
    Json(ResetResponse { ok: true })
}
