//! JSON extractor with relay-formatted error responses
//!
//! Wraps Axum's `Json` extractor so that every body rejection (syntax error,
//! wrong field type, missing content type) comes back as a 400 carrying the
//! usual `{"error": ..., "status": "error"}` envelope instead of Axum's plain
//! text.

use crate::error::AppError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// Rejection produced by [`ApiJson`]
#[derive(Debug)]
pub struct ApiJsonRejection(JsonRejection);

impl ApiJsonRejection {
    /// Caller-facing description of what went wrong
    pub fn message(&self) -> String {
        match &self.0 {
            JsonRejection::MissingJsonContentType(_) => {
                "Content-Type must be application/json".to_string()
            }
            other => other.body_text(),
        }
    }
}

impl IntoResponse for ApiJsonRejection {
    fn into_response(self) -> Response {
        AppError::Validation(self.message()).into_response()
    }
}

/// Drop-in replacement for `axum::Json` in request position
///
/// ```ignore
/// pub async fn handler(
///     ApiJson(request): ApiJson<ChatRequest>,
/// ) -> AppResult<Json<ChatResponse>> {
///     // Malformed bodies never reach this point
/// }
/// ```
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiJsonRejection(rejection)),
        }
    }
}
