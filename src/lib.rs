//! Research relay
//!
//! Exchanges a cloud API key for a bearer token, forwards chat and research
//! queries to a deployed model's scoring endpoint, and refreshes the token
//! once when the endpoint rejects it. A sentinel API key switches to a demo
//! mode that answers locally.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod telemetry;
