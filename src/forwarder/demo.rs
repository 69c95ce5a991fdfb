//! Demo-mode responder
//!
//! Answers from a small ordered keyword table. Matching is a case-insensitive
//! substring test against the first user message; the first keyword found
//! wins.

use super::{ForwardError, Forwarder, QueryResponse, record_duration};
use crate::auth::TokenManager;
use crate::metrics::{Metrics, QueryMode};
use crate::models::{Message, message::first_user_content};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Keyword table, checked in order
pub const DEMO_REPLIES: &[(&str, &str)] = &[
    (
        "artificial intelligence",
        "Artificial Intelligence (AI) refers to computer systems that can perform tasks \
        typically requiring human intelligence, such as learning, reasoning, and problem-solving.",
    ),
    (
        "quantum computing",
        "Quantum computing leverages quantum mechanical phenomena to process information in \
        ways that classical computers cannot, potentially solving complex problems exponentially faster.",
    ),
    (
        "machine learning",
        "Machine learning is a subset of AI that enables computers to learn and improve from \
        experience without being explicitly programmed for every task.",
    ),
];

/// Reply used when no keyword matches
pub const DEFAULT_DEMO_REPLY: &str = "This is a demo response for your query. In production, \
    this would be processed by the deployed model to provide comprehensive research insights \
    about your topic.";

/// Canned reply for a conversation
pub fn canned_reply(messages: &[Message]) -> &'static str {
    let query = first_user_content(messages)
        .unwrap_or_default()
        .to_lowercase();

    DEMO_REPLIES
        .iter()
        .find(|(keyword, _)| query.contains(keyword))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_DEMO_REPLY)
}

/// Reply body in demo mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReply {
    pub generated_text: String,
    pub demo_mode: bool,
}

impl DemoReply {
    pub fn for_messages(messages: &[Message]) -> Self {
        Self {
            generated_text: canned_reply(messages).to_string(),
            demo_mode: true,
        }
    }
}

/// Network-free forwarder used when the demo API key is configured
pub struct DemoResponder {
    tokens: Arc<TokenManager>,
    latency: Duration,
    metrics: Arc<Metrics>,
}

impl DemoResponder {
    pub fn new(tokens: Arc<TokenManager>, latency: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            tokens,
            latency,
            metrics,
        }
    }
}

#[async_trait]
impl Forwarder for DemoResponder {
    async fn query(&self, messages: &[Message]) -> Result<QueryResponse, ForwardError> {
        let started = Instant::now();

        // Synthetic token; keeps the token lifecycle identical to live mode
        self.tokens.token().await?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = DemoReply::for_messages(messages);
        self.metrics.record_demo_reply();
        record_duration(&self.metrics, QueryMode::Demo, started.elapsed());

        tracing::info!(
            message_count = messages.len(),
            reply_length = reply.generated_text.len(),
            "Served demo reply"
        );

        Ok(QueryResponse::Demo(reply))
    }

    fn mode(&self) -> QueryMode {
        QueryMode::Demo
    }
}
