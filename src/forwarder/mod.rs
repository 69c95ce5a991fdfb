//! Query forwarding
//!
//! A [`Forwarder`] turns a conversation into a [`QueryResponse`]. The live
//! implementation posts to the deployment's scoring endpoint; the demo
//! implementation answers from a fixed table without touching the network.

pub mod demo;
pub mod error;
pub mod scoring;

pub use demo::{DEFAULT_DEMO_REPLY, DemoReply, DemoResponder};
pub use error::ForwardError;
pub use scoring::ScoringClient;

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::{Metrics, QueryMode};
use crate::models::Message;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Sends a conversation to the model and returns its answer
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn query(&self, messages: &[Message]) -> Result<QueryResponse, ForwardError>;

    /// Which mode this forwarder serves (used for metrics and logs)
    fn mode(&self) -> QueryMode;
}

/// Successful answer to a query
///
/// Serialises as the bare upstream JSON or as the demo reply object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    /// Body returned by the scoring endpoint, passed through verbatim
    Scored(serde_json::Value),
    Demo(DemoReply),
}

/// Build the forwarder matching the configured API key
pub fn from_config(
    config: &Config,
    tokens: Arc<TokenManager>,
    metrics: Arc<Metrics>,
) -> AppResult<Arc<dyn Forwarder>> {
    if config.is_demo_mode() {
        tracing::info!(
            latency_ms = config.demo.latency_ms,
            "Demo mode enabled: queries are answered locally"
        );
        return Ok(Arc::new(DemoResponder::new(
            tokens,
            Duration::from_millis(config.demo.latency_ms),
            metrics,
        )));
    }

    Ok(Arc::new(ScoringClient::from_config(config, tokens, metrics)?))
}

/// Record query latency, logging instead of failing on metrics errors
pub(crate) fn record_duration(metrics: &Metrics, mode: QueryMode, elapsed: Duration) {
    let duration_ms = elapsed.as_secs_f64() * 1000.0;
    if let Err(e) = metrics.record_query_duration(mode, duration_ms) {
        tracing::warn!(
            error = %e,
            mode = mode.as_str(),
            duration_ms,
            "Metrics recording failed (non-fatal)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_response_serializes_verbatim() {
        let upstream = serde_json::json!({"choices": [{"message": {"content": "hi"}}]});
        let response = QueryResponse::Scored(upstream.clone());
        assert_eq!(serde_json::to_value(&response).unwrap(), upstream);
    }

    #[test]
    fn test_demo_response_serializes_flat() {
        let response = QueryResponse::Demo(DemoReply {
            generated_text: "canned".to_string(),
            demo_mode: true,
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"generated_text": "canned", "demo_mode": true})
        );
    }

    #[tokio::test]
    async fn test_from_config_picks_demo_for_sentinel() {
        let config: Config = "[provider]\napi_key = \"DEMO_MODE\"\n".parse().unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        let tokens =
            Arc::new(TokenManager::from_config(&config.provider, metrics.clone()).unwrap());
        let forwarder = from_config(&config, tokens, metrics).unwrap();
        assert_eq!(forwarder.mode(), QueryMode::Demo);
    }

    #[tokio::test]
    async fn test_from_config_picks_scoring_for_live_key() {
        let config: Config = r#"
[provider]
api_key = "live"
deployment_id = "dep"
ml_url = "http://127.0.0.1:9/ml/v4/deployments"
"#
        .parse()
        .unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        let tokens =
            Arc::new(TokenManager::from_config(&config.provider, metrics.clone()).unwrap());
        let forwarder = from_config(&config, tokens, metrics).unwrap();
        assert_eq!(forwarder.mode(), QueryMode::Live);
    }
}
