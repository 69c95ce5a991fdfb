//! `GET /test-connection`
//!
//! Forces a token exchange with the identity provider and reports the result.
//! The new token replaces the cached one.

use crate::handlers::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<ConnectionResponse>) {
    match state.tokens().get_token().await {
        Ok(token) => {
            tracing::info!(token_preview = %token.preview(), "Connection test succeeded");
            (
                StatusCode::OK,
                Json(ConnectionResponse {
                    status: "success",
                    message: "Successfully connected to the identity provider".to_string(),
                    token_preview: Some(token.preview()),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Connection test failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectionResponse {
                    status: "error",
                    message: format!("Connection failed: {}", e),
                    token_preview: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
