//! Research relay HTTP server

use clap::Parser;
use research_relay::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        return write_template(output.as_deref());
    }

    // Loaded before telemetry so RUST_LOG can come from the env file too
    let env_file_loaded = load_env_file(&cli.env_file)?;

    let config = Config::load(&cli.config)?;

    telemetry::init(config.log_level());

    if env_file_loaded {
        tracing::info!(path = %cli.env_file, "Loaded environment file");
    }
    log_startup_diagnostics(&cli.config, &config);

    let config = Arc::new(config);
    let state = AppState::new(config.clone())?;
    let app = handlers::router(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn write_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Configuration template written to {}", path);
        }
        None => print!("{}", template),
    }
    Ok(())
}

/// Load `path` into the process environment if it exists
///
/// Variables that are already set keep their values.
fn load_env_file(path: &str) -> Result<bool, dotenvy::Error> {
    if !Path::new(path).exists() {
        return Ok(false);
    }
    dotenvy::from_path(path)?;
    Ok(true)
}

fn log_startup_diagnostics(config_path: &str, config: &Config) {
    let provider = &config.provider;
    let config_source = if Path::new(config_path).exists() {
        config_path
    } else {
        "environment"
    };

    tracing::info!(
        config_source,
        api_key_kind = provider.api_key_kind().as_str(),
        demo_mode = if config.is_demo_mode() { "YES" } else { "NO" },
        "Starting research relay"
    );

    if config.is_demo_mode() {
        tracing::info!(
            latency_ms = config.demo.latency_ms,
            "Demo mode: no requests will be sent to the identity provider or scoring endpoint"
        );
    } else {
        tracing::info!(
            iam_url = provider.iam_url(),
            scoring_url = %provider.scoring_url(),
            scoring_timeout_seconds = config.server.request_timeout_seconds,
            token_timeout_seconds = provider.token_timeout_seconds(),
            "Provider endpoints"
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
