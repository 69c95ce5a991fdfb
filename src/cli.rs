//! Command-line interface for the research relay

use clap::{Parser, Subcommand};

/// Relay between a research frontend and a deployed model scoring endpoint
#[derive(Parser)]
#[command(name = "research-relay")]
#[command(version)]
#[command(about = "Relay research and chat queries to a deployed model scoring endpoint")]
#[command(
    long_about = "research-relay exchanges an API key for a bearer token, forwards research \
    and chat queries to a deployed model's scoring endpoint, and transparently refreshes the \
    token once when it is rejected. Set the API key to DEMO_MODE to serve canned replies \
    without any provider."
)]
pub struct Cli {
    /// Path to configuration file (environment variables are used alone if it does not exist)
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    /// Environment file loaded before reading configuration; already-set variables win
    #[arg(long, default_value = "config.env", global = true)]
    pub env_file: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Research Relay Configuration
# ============================
#
# Every provider value can also be supplied through the environment
# (or a config.env file): API_KEY, DEPLOYMENT_ID, WATSON_ML_URL, IAM_URL,
# VERSION, HOST, PORT, DEMO_LATENCY_MS. Environment values override this file.

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Timeout for a single scoring call, in seconds (1-300)
request_timeout_seconds = 30

[provider]
# API key exchanged for a bearer token. Keys starting with "cpd-apikey" use the
# Cloud Pak flow. Set to "DEMO_MODE" to answer from canned replies without
# contacting any provider.
api_key = "DEMO_MODE"

# Deployment identifier of the model service
deployment_id = "your-deployment-id"

# Base URL of the deployments API; the scoring URL is
# {ml_url}/{deployment_id}/ai_service?version={version}
ml_url = "https://us-south.ml.cloud.ibm.com/ml/v4/deployments"

# IAM token endpoint
iam_url = "https://iam.cloud.ibm.com/identity/token"

# Scoring API version
version = "2021-05-01"

# Timeout for the token exchange, in seconds (1-300)
token_timeout_seconds = 30

[demo]
# Artificial delay before each canned reply, in milliseconds
latency_ms = 1000

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_paths() {
        let cli = Cli::parse_from(["research-relay"]);
        assert_eq!(cli.config, "config.toml");
        assert_eq!(cli.env_file, "config.env");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_paths() {
        let cli = Cli::parse_from([
            "research-relay",
            "--config",
            "custom.toml",
            "--env-file",
            "prod.env",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.env_file, "prod.env");
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["research-relay", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn template_is_a_valid_config() {
        let config: Config = generate_config_template()
            .parse()
            .expect("template should parse and validate");
        assert!(config.is_demo_mode());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.demo.latency_ms, 1000);
    }

    #[test]
    fn template_has_all_sections() {
        let template = generate_config_template();
        for section in ["[server]", "[provider]", "[demo]", "[observability]"] {
            assert!(template.contains(section), "missing {}", section);
        }
    }
}
