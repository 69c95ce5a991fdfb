//! Query forwarding errors

use crate::auth::AuthError;
use axum::http::StatusCode;
use thiserror::Error;

/// Why a query could not be answered
///
/// Returned as data from [`crate::forwarder::Forwarder::query`]; the HTTP
/// layer decides which status code the caller sees.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Authentication with the identity provider failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Scoring endpoint returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Scoring request timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Scoring request failed: {0}")]
    Transport(String),

    #[error("Scoring endpoint returned a body that is not valid JSON: {0}")]
    InvalidResponse(String),
}

impl ForwardError {
    /// True for an HTTP 401 from the scoring endpoint
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Upstream { status: 401, .. })
    }

    /// HTTP status reported to the caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. } | Self::Transport(_) | Self::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
