//! `POST /research`
//!
//! Wraps a single research question (plus optional context) in a fixed
//! system prompt and forwards it.

use crate::error::{AppError, AppResult};
use crate::forwarder::QueryResponse;
use crate::handlers::{AppState, ApiJson};
use crate::models::Message;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

/// System prompt placed before every research query
pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a helpful research assistant. Provide \
    comprehensive, accurate, and well-structured responses based on the user's query.";

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 100_000;

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub query: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub query: String,
    pub response: QueryResponse,
    pub status: &'static str,
}

/// A query that passed validation, with its length in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValidQuery<'a> {
    text: &'a str,
    chars: usize,
}

impl ResearchRequest {
    /// The query, if present and usable
    fn validated_query(&self) -> AppResult<ValidQuery<'_>> {
        let query = self
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Query is required".to_string()))?;

        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(AppError::Validation(format!(
                "Query is too long ({} characters, maximum {})",
                chars, MAX_QUERY_CHARS
            )));
        }

        Ok(ValidQuery { text: query, chars })
    }
}

/// Conversation sent to the model for a research query
pub fn research_messages(query: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(RESEARCH_SYSTEM_PROMPT),
        Message::user(format!("Research Query: {}\nContext: {}", query, context)),
    ]
}

pub async fn handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResearchRequest>,
) -> AppResult<Json<ResearchResponse>> {
    let query = request.validated_query()?;
    let context = request.context.as_deref().unwrap_or_default();

    tracing::info!(
        query_length = query.chars,
        has_context = !context.is_empty(),
        "Research request received"
    );

    let messages = research_messages(query.text, context);
    let response = state.forwarder().query(&messages).await?;

    Ok(Json(ResearchResponse {
        query: query.text.to_string(),
        response,
        status: "success",
    }))
}
