//! Health check endpoint
//!
//! Liveness only: never contacts the identity provider or the scoring
//! endpoint.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "Research Agent Relay";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn handler() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            service: SERVICE_NAME,
        }),
    )
}
