//! Prometheus metrics collection for the research relay
//!
//! This module provides metrics instrumentation for tracking:
//! - Token exchanges with the identity provider and refreshes after a 401
//! - Scoring calls by outcome
//! - Demo replies served
//! - End-to-end query latency by mode
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label for token exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFetchOutcome {
    Success,
    Failure,
}

impl TokenFetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Outcome label for a single scoring POST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringOutcome {
    Success,
    /// HTTP 401 from the scoring endpoint
    Unauthorized,
    /// Any other non-2xx status
    HttpError,
    Timeout,
    /// Connection failure before a response arrived
    TransportError,
    /// 2xx response whose body is not JSON
    InvalidResponse,
}

impl ScoringOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unauthorized => "unauthorized",
            Self::HttpError => "http_error",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// Which forwarder answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Live,
    Demo,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Demo => "demo",
        }
    }
}

/// Metrics collector for the relay
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    token_fetches: IntCounterVec,
    token_refreshes: IntCounter,
    scoring_requests: IntCounterVec,
    demo_replies: IntCounter,
    query_duration: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let token_fetches = IntCounterVec::new(
            Opts::new(
                "relay_token_fetches_total",
                "Token exchanges with the identity provider by outcome",
            ),
            &["outcome"],
        )?;

        // Only refreshes triggered by a 401, not the lazy first fetch
        let token_refreshes = IntCounter::with_opts(Opts::new(
            "relay_token_refreshes_total",
            "Token refreshes triggered by the scoring endpoint rejecting a token",
        ))?;

        let scoring_requests = IntCounterVec::new(
            Opts::new(
                "relay_scoring_requests_total",
                "Scoring endpoint POSTs by outcome (retries counted separately)",
            ),
            &["outcome"],
        )?;

        let demo_replies = IntCounter::with_opts(Opts::new(
            "relay_demo_replies_total",
            "Canned replies served in demo mode",
        ))?;

        let query_duration = HistogramVec::new(
            HistogramOpts::new(
                "relay_query_duration_ms",
                "End-to-end query latency in milliseconds, including any token refresh",
            )
            .buckets(vec![
                10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0,
            ]),
            &["mode"],
        )?;

        registry.register(Box::new(token_fetches.clone()))?;
        registry.register(Box::new(token_refreshes.clone()))?;
        registry.register(Box::new(scoring_requests.clone()))?;
        registry.register(Box::new(demo_replies.clone()))?;
        registry.register(Box::new(query_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            token_fetches,
            token_refreshes,
            scoring_requests,
            demo_replies,
            query_duration,
        })
    }

    /// Record a token exchange
    pub fn record_token_fetch(&self, outcome: TokenFetchOutcome) -> Result<(), prometheus::Error> {
        self.token_fetches
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Record a refresh caused by a rejected token
    pub fn record_token_refresh(&self) {
        self.token_refreshes.inc();
    }

    /// Record one scoring POST
    pub fn record_scoring_request(&self, outcome: ScoringOutcome) -> Result<(), prometheus::Error> {
        self.scoring_requests
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_demo_reply(&self) {
        self.demo_replies.inc();
    }

    /// Record query latency
    ///
    /// # Errors
    ///
    /// Rejects NaN, infinite and negative durations; they would corrupt the
    /// histogram percentiles.
    pub fn record_query_duration(
        &self,
        mode: QueryMode,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.query_duration
            .get_metric_with_label_values(&[mode.as_str()])?
            .observe(duration_ms);
        Ok(())
    }

    pub fn token_fetch_count(&self, outcome: TokenFetchOutcome) -> u64 {
        self.token_fetches
            .get_metric_with_label_values(&[outcome.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    pub fn token_refresh_count(&self) -> u64 {
        self.token_refreshes.get()
    }

    pub fn scoring_request_count(&self, outcome: ScoringOutcome) -> u64 {
        self.scoring_requests
            .get_metric_with_label_values(&[outcome.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    pub fn demo_reply_count(&self) -> u64 {
        self.demo_replies.get()
    }

    /// Encode all registered metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            e
        })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}
