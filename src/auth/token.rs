//! Token Manager
//!
//! Exchanges the configured API key for a bearer token at the IAM endpoint
//! and keeps the most recent token in memory. Expiry is normally discovered
//! when the scoring endpoint answers 401; if the IAM response carries
//! `expires_in`, the token is also replaced shortly before it runs out.

use super::{AuthError, Credentials};
use crate::config::ProviderConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, TokenFetchOutcome};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Synthetic token handed out in demo mode
pub const DEMO_TOKEN: &str = "demo_token_12345";

/// Tokens this close to expiry are treated as already expired
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Number of characters shown by [`BearerToken::preview`]
const PREVIEW_CHARS: usize = 20;

/// Opaque bearer credential
///
/// `Debug` only shows the preview so tokens never end up in logs in full.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Arc<str>);

impl BearerToken {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 20 characters followed by `...`
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&self.preview()).finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: BearerToken,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at
            .is_none_or(|expires_at| now + EXPIRY_MARGIN < expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl IamTokenResponse {
    /// Token lifetime in whole seconds, when the provider sent a usable one
    ///
    /// Fractional values are truncated. Negative, non-numeric and other
    /// unusable values yield `None` and leave refresh to the 401 path.
    fn lifetime_seconds(&self) -> Option<u64> {
        match self.expires_in.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                    .map(|seconds| seconds as u64)
            }),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Deadline `seconds` from `now`, or `None` if it does not fit in an `Instant`
fn expiry_deadline(now: Instant, seconds: u64) -> Option<Instant> {
    now.checked_add(Duration::from_secs(seconds))
}

/// Obtains and caches the bearer token
///
/// The cached token sits behind an async mutex that is held for the whole
/// IAM round trip, so concurrent callers never refresh twice for the same
/// rejected token.
pub struct TokenManager {
    credentials: Credentials,
    http: reqwest::Client,
    timeout_seconds: u64,
    current: Mutex<Option<CachedToken>>,
    metrics: Arc<Metrics>,
}

impl TokenManager {
    /// Create a manager with no token cached yet
    pub fn new(
        credentials: Credentials,
        timeout_seconds: u64,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::Internal(format!("Failed to build HTTP client for token requests: {}", e))
            })?;

        Ok(Self {
            credentials,
            http,
            timeout_seconds,
            current: Mutex::new(None),
            metrics,
        })
    }

    pub fn from_config(provider: &ProviderConfig, metrics: Arc<Metrics>) -> AppResult<Self> {
        Self::new(
            Credentials::from_config(provider),
            provider.token_timeout_seconds(),
            metrics,
        )
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Currently cached token, if any, without contacting the provider
    pub async fn cached(&self) -> Option<BearerToken> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|cached| cached.token.clone())
    }

    /// Obtain a new token from the provider and cache it
    ///
    /// Always performs the exchange (except in demo mode, which returns
    /// [`DEMO_TOKEN`] without any network call).
    pub async fn get_token(&self) -> Result<BearerToken, AuthError> {
        let mut current = self.current.lock().await;
        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    /// Cached token, fetching one first if none is usable
    pub async fn token(&self) -> Result<BearerToken, AuthError> {
        let mut current = self.current.lock().await;

        match current.as_ref() {
            Some(cached) if cached.is_fresh(Instant::now()) => return Ok(cached.token.clone()),
            Some(_) => tracing::debug!("Cached token is about to expire, requesting a new one"),
            None => tracing::debug!("No token cached yet, requesting one"),
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    /// Replace a token the scoring endpoint rejected
    ///
    /// If another request already swapped the cached token for a different
    /// one, that token is returned instead of fetching again.
    pub async fn refresh_after_rejection(
        &self,
        rejected: &BearerToken,
    ) -> Result<BearerToken, AuthError> {
        let mut current = self.current.lock().await;

        if let Some(cached) = current.as_ref() {
            if &cached.token != rejected && cached.is_fresh(Instant::now()) {
                tracing::debug!(
                    token_preview = %cached.token.preview(),
                    "Token was already refreshed by a concurrent request"
                );
                return Ok(cached.token.clone());
            }
        }

        tracing::info!(
            rejected_preview = %rejected.preview(),
            "Token rejected by scoring endpoint, requesting a new one"
        );
        self.metrics.record_token_refresh();

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    async fn request_token(&self) -> Result<CachedToken, AuthError> {
        if self.credentials.is_demo() {
            return Ok(CachedToken {
                token: BearerToken::new(DEMO_TOKEN),
                expires_at: None,
            });
        }

        let result = self.exchange_api_key().await;
        let outcome = match &result {
            Ok(_) => TokenFetchOutcome::Success,
            Err(_) => TokenFetchOutcome::Failure,
        };
        if let Err(e) = self.metrics.record_token_fetch(outcome) {
            tracing::warn!(error = %e, "Metrics recording failed (non-fatal)");
        }
        result
    }

    async fn exchange_api_key(&self) -> Result<CachedToken, AuthError> {
        let url = self.credentials.iam_url();

        tracing::debug!(
            iam_url = %url,
            key_kind = self.credentials.kind().as_str(),
            "Requesting access token"
        );

        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&self.credentials.form_fields())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::error!(
                iam_url = %url,
                status = status.as_u16(),
                body = %body,
                "Token request failed"
            );
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: IamTokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(iam_url = %url, error = %e, "Token response is not valid JSON");
            AuthError::MalformedResponse(e.to_string())
        })?;

        let access_token = parsed
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                tracing::error!(iam_url = %url, "Token response has no access_token");
                AuthError::MissingAccessToken
            })?;

        let token = BearerToken::new(access_token);
        let lifetime = parsed.lifetime_seconds();
        if let (None, Some(raw)) = (lifetime, parsed.expires_in.as_ref()) {
            tracing::warn!(expires_in = %raw, "Ignoring unusable expires_in in token response");
        }
        let expires_at = lifetime.and_then(|seconds| expiry_deadline(Instant::now(), seconds));

        tracing::info!(
            token_preview = %token.preview(),
            expires_in_seconds = ?lifetime,
            "Obtained access token"
        );

        Ok(CachedToken { token, expires_at })
    }

    fn transport_error(&self, error: reqwest::Error) -> AuthError {
        let url = self.credentials.iam_url().to_string();
        if error.is_timeout() {
            tracing::error!(iam_url = %url, timeout_seconds = self.timeout_seconds, "Token request timed out");
            AuthError::Timeout {
                url,
                timeout_seconds: self.timeout_seconds,
            }
        } else {
            tracing::error!(iam_url = %url, error = %error, "Token request failed");
            AuthError::Transport {
                url,
                reason: error.to_string(),
            }
        }
    }
}
