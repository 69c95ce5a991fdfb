//! `POST /chat`
//!
//! Forwards a caller-built conversation unchanged.

use crate::error::{AppError, AppResult};
use crate::forwarder::QueryResponse;
use crate::handlers::{AppState, ApiJson};
use crate::models::Message;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Option<Vec<Message>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: QueryResponse,
    pub status: &'static str,
}

pub async fn handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let messages = request
        .messages
        .filter(|messages| !messages.is_empty())
        .ok_or_else(|| AppError::Validation("Messages array is required".to_string()))?;

    tracing::info!(message_count = messages.len(), "Chat request received");

    let response = state.forwarder().query(&messages).await?;

    Ok(Json(ChatResponse {
        response,
        status: "success",
    }))
}
