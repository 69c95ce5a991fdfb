//! Live forwarder for the deployment's scoring endpoint
//!
//! Posts `{"messages": [...]}` with the cached bearer token. A 401 triggers
//! exactly one token refresh and one retry of the same request; whatever the
//! retry returns is final.

use super::{ForwardError, Forwarder, QueryResponse, record_duration};
use crate::auth::{BearerToken, TokenManager};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, QueryMode, ScoringOutcome};
use crate::models::Message;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct ScoringRequest<'a> {
    messages: &'a [Message],
}

/// HTTP client for the scoring endpoint
pub struct ScoringClient {
    tokens: Arc<TokenManager>,
    http: reqwest::Client,
    scoring_url: String,
    timeout_seconds: u64,
    metrics: Arc<Metrics>,
}

impl ScoringClient {
    pub fn new(
        scoring_url: impl Into<String>,
        timeout_seconds: u64,
        tokens: Arc<TokenManager>,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::Internal(format!("Failed to build HTTP client for scoring: {}", e))
            })?;

        Ok(Self {
            tokens,
            http,
            scoring_url: scoring_url.into(),
            timeout_seconds,
            metrics,
        })
    }

    pub fn from_config(
        config: &Config,
        tokens: Arc<TokenManager>,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        Self::new(
            config.provider.scoring_url(),
            config.server.request_timeout_seconds,
            tokens,
            metrics,
        )
    }

    pub fn scoring_url(&self) -> &str {
        &self.scoring_url
    }

    async fn query_with_refresh(
        &self,
        messages: &[Message],
    ) -> Result<serde_json::Value, ForwardError> {
        let token = self.tokens.token().await?;
        let payload = ScoringRequest { messages };

        tracing::info!(
            scoring_url = %self.scoring_url,
            message_count = messages.len(),
            "Sending query to scoring endpoint"
        );

        match self.post(&token, &payload).await {
            Err(e) if e.is_unauthorized() => {
                let fresh = self.tokens.refresh_after_rejection(&token).await?;
                let retried = self.post(&fresh, &payload).await;
                match &retried {
                    Ok(_) => tracing::info!("Scoring request succeeded after token refresh"),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Scoring request failed after token refresh, giving up"
                    ),
                }
                retried
            }
            other => other,
        }
    }

    /// One POST to the scoring endpoint, no retries
    async fn post(
        &self,
        token: &BearerToken,
        payload: &ScoringRequest<'_>,
    ) -> Result<serde_json::Value, ForwardError> {
        let response = self
            .http
            .post(&self.scoring_url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(
                    scoring_url = %self.scoring_url,
                    status = status.as_u16(),
                    error = %e,
                    "Failed to read error response body"
                );
                String::new()
            });
            let outcome = if status.as_u16() == 401 {
                tracing::info!(
                    scoring_url = %self.scoring_url,
                    "Scoring endpoint rejected the token (HTTP 401)"
                );
                ScoringOutcome::Unauthorized
            } else {
                tracing::error!(
                    scoring_url = %self.scoring_url,
                    status = status.as_u16(),
                    body = %body,
                    "Scoring endpoint returned an error status"
                );
                ScoringOutcome::HttpError
            };
            self.record(outcome);
            return Err(ForwardError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                scoring_url = %self.scoring_url,
                error = %e,
                body_length = body.len(),
                "Scoring response is not valid JSON"
            );
            self.record(ScoringOutcome::InvalidResponse);
            ForwardError::InvalidResponse(e.to_string())
        })?;

        self.record(ScoringOutcome::Success);
        tracing::info!(
            response_length = body.len(),
            "Scoring response received"
        );

        Ok(value)
    }

    fn transport_error(&self, error: reqwest::Error) -> ForwardError {
        if error.is_timeout() {
            tracing::error!(
                scoring_url = %self.scoring_url,
                timeout_seconds = self.timeout_seconds,
                "Scoring request timed out"
            );
            self.record(ScoringOutcome::Timeout);
            ForwardError::Timeout {
                timeout_seconds: self.timeout_seconds,
            }
        } else {
            tracing::error!(
                scoring_url = %self.scoring_url,
                error = %error,
                "Scoring request failed"
            );
            self.record(ScoringOutcome::TransportError);
            ForwardError::Transport(error.to_string())
        }
    }

    fn record(&self, outcome: ScoringOutcome) {
        if let Err(e) = self.metrics.record_scoring_request(outcome) {
            tracing::warn!(
                error = %e,
                outcome = outcome.as_str(),
                "Metrics recording failed (non-fatal)"
            );
        }
    }
}

#[async_trait]
impl Forwarder for ScoringClient {
    async fn query(&self, messages: &[Message]) -> Result<QueryResponse, ForwardError> {
        let started = Instant::now();
        let result = self.query_with_refresh(messages).await;
        record_duration(&self.metrics, QueryMode::Live, started.elapsed());
        result.map(QueryResponse::Scored)
    }

    fn mode(&self) -> QueryMode {
        QueryMode::Live
    }
}
