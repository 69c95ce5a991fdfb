//! Prometheus metrics endpoint
//!
//! ```bash
//! curl http://localhost:3000/metrics
//! # HELP relay_token_fetches_total Token exchanges with the identity provider by outcome
//! # TYPE relay_token_fetches_total counter
//! relay_token_fetches_total{outcome="success"} 3
//! ```

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Returns `200 OK` with the text exposition, or `500` if encoding fails
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for Prometheus scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}
