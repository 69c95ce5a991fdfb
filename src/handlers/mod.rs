//! HTTP request handlers for the research relay

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::AppResult;
use crate::forwarder::{self, Forwarder};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod chat;
pub mod connection;
pub mod extractor;
pub mod health;
pub mod metrics;
pub mod research;

pub use extractor::ApiJson;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers. The token
/// manager is the single owner of the cached bearer token; the forwarder and
/// `/test-connection` share it.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    tokens: Arc<TokenManager>,
    forwarder: Arc<dyn Forwarder>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create the state from configuration, picking the live or demo
    /// forwarder from the API key
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let tokens = Arc::new(TokenManager::from_config(&config.provider, metrics.clone())?);
        let forwarder = forwarder::from_config(&config, tokens.clone(), metrics.clone())?;

        Ok(Self::from_parts(config, tokens, forwarder, metrics))
    }

    /// Create the state around a caller-supplied forwarder
    pub fn with_forwarder(config: Arc<Config>, forwarder: Arc<dyn Forwarder>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let tokens = Arc::new(TokenManager::from_config(&config.provider, metrics.clone())?);

        Ok(Self::from_parts(config, tokens, forwarder, metrics))
    }

    pub fn from_parts(
        config: Arc<Config>,
        tokens: Arc<TokenManager>,
        forwarder: Arc<dyn Forwarder>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            tokens,
            forwarder,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn forwarder(&self) -> &dyn Forwarder {
        self.forwarder.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the HTTP router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/research", post(research::handler))
        .route("/chat", post(chat::handler))
        .route("/test-connection", get(connection::handler))
        .route("/metrics", get(metrics::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
