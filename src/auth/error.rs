//! Token acquisition errors

use thiserror::Error;

/// Failure to obtain a bearer token from the identity provider
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Token request to {url} timed out after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Identity provider returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Identity provider response is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("Identity provider response did not contain an access_token")]
    MissingAccessToken,
}
