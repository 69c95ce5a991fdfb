//! Configuration management for the research relay
//!
//! Settings come from a TOML file, from environment variables, or from both
//! (environment wins). A `config.env` file is loaded into the process
//! environment by `main` before any of this runs.

use crate::auth::ApiKeyKind;
use crate::error::{AppError, AppResult};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Environment variable carrying the provider API key
pub const ENV_API_KEY: &str = "API_KEY";
/// Environment variable carrying the deployment identifier
pub const ENV_DEPLOYMENT_ID: &str = "DEPLOYMENT_ID";
/// Environment variable carrying the model-service base URL
pub const ENV_ML_URL: &str = "WATSON_ML_URL";
/// Environment variable carrying the IAM token endpoint
pub const ENV_IAM_URL: &str = "IAM_URL";
/// Environment variable carrying the scoring API version string
pub const ENV_VERSION: &str = "VERSION";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_DEMO_LATENCY_MS: &str = "DEMO_LATENCY_MS";

/// Upper bound for every timeout setting, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Budget for a single scoring call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

/// Model provider configuration
///
/// Fields are private so the API key can only leave this struct through
/// [`ProviderConfig::api_key`], which hands out the `Secret` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "empty_api_key")]
    api_key: Secret<String>,
    #[serde(default)]
    deployment_id: String,
    #[serde(default)]
    ml_url: String,
    #[serde(default = "default_iam_url")]
    iam_url: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "default_token_timeout")]
    token_timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: empty_api_key(),
            deployment_id: String::new(),
            ml_url: String::new(),
            iam_url: default_iam_url(),
            version: default_version(),
            token_timeout_seconds: default_token_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Get the API key (still wrapped)
    pub fn api_key(&self) -> &Secret<String> {
        &self.api_key
    }

    /// Classify the configured API key
    pub fn api_key_kind(&self) -> ApiKeyKind {
        ApiKeyKind::classify(self.api_key.expose_secret())
    }

    /// Get the deployment identifier
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Get the model-service base URL
    pub fn ml_url(&self) -> &str {
        &self.ml_url
    }

    /// Get the IAM token endpoint
    pub fn iam_url(&self) -> &str {
        &self.iam_url
    }

    /// Get the scoring API version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the token request timeout in seconds
    pub fn token_timeout_seconds(&self) -> u64 {
        self.token_timeout_seconds
    }

    /// Scoring URL for the configured deployment
    ///
    /// `{ml_url}/{deployment_id}/ai_service?version={version}`
    pub fn scoring_url(&self) -> String {
        format!(
            "{}/{}/ai_service?version={}",
            self.ml_url.trim_end_matches('/'),
            self.deployment_id,
            self.version
        )
    }
}

fn empty_api_key() -> Secret<String> {
    Secret::new(String::new())
}

fn default_iam_url() -> String {
    "https://iam.cloud.ibm.com/identity/token".to_string()
}

fn default_version() -> String {
    "2021-05-01".to_string()
}

fn default_token_timeout() -> u64 {
    30
}

/// Demo-mode behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Artificial latency added to every canned reply
    #[serde(default = "default_demo_latency")]
    pub latency_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_demo_latency(),
        }
    }
}

fn default_demo_latency() -> u64 {
    1000
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();
        let config = Self::parse_file(path.as_ref())?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from process environment variables only
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults plus whatever `lookup` provides
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path` if it exists, overlaying environment variables;
    /// otherwise fall back to the environment alone.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit variable source
    pub fn load_with<P, F>(path: P, lookup: F) -> AppResult<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Self::from_lookup(lookup);
        }

        let path_display = path.display().to_string();
        let mut config = Self::parse_file(path)?;
        config.apply_overrides(lookup)?;
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> AppResult<Self> {
        let path_display = path.display().to_string();

        let content =
            std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display,
            source,
        })
    }

    /// Overlay environment-style variables onto this configuration
    ///
    /// Blank values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = get(ENV_API_KEY) {
            self.provider.api_key = Secret::new(api_key.trim().to_string());
        }
        if let Some(deployment_id) = get(ENV_DEPLOYMENT_ID) {
            self.provider.deployment_id = deployment_id.trim().to_string();
        }
        if let Some(ml_url) = get(ENV_ML_URL) {
            self.provider.ml_url = ml_url.trim().to_string();
        }
        if let Some(iam_url) = get(ENV_IAM_URL) {
            self.provider.iam_url = iam_url.trim().to_string();
        }
        if let Some(version) = get(ENV_VERSION) {
            self.provider.version = version.trim().to_string();
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = get(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|_| {
                AppError::Config(format!("{} must be a port number, got '{}'", ENV_PORT, port))
            })?;
        }
        if let Some(latency) = get(ENV_DEMO_LATENCY_MS) {
            self.demo.latency_ms = latency.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a whole number of milliseconds, got '{}'",
                    ENV_DEMO_LATENCY_MS, latency
                ))
            })?;
        }

        Ok(())
    }

    /// Whether the configured API key is the demo sentinel
    pub fn is_demo_mode(&self) -> bool {
        self.provider.api_key_kind() == ApiKeyKind::Demo
    }

    /// Validate configuration after parsing
    ///
    /// Demo mode never touches the network, so the provider URLs are only
    /// checked for live keys.
    pub fn validate(&self) -> AppResult<()> {
        if self.provider.api_key.expose_secret().trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider.api_key is empty. Set it in the config file or via the {} \
                environment variable (use '{}' to run without a provider).",
                ENV_API_KEY,
                crate::auth::DEMO_API_KEY
            )));
        }

        for (name, value) in [
            ("server.request_timeout_seconds", self.server.request_timeout_seconds),
            (
                "provider.token_timeout_seconds",
                self.provider.token_timeout_seconds,
            ),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
            if value > MAX_TIMEOUT_SECONDS {
                return Err(AppError::Config(format!(
                    "{} cannot exceed {} seconds, got {}",
                    name, MAX_TIMEOUT_SECONDS, value
                )));
            }
        }

        if self.is_demo_mode() {
            return Ok(());
        }

        if self.provider.deployment_id.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider.deployment_id is empty (env: {})",
                ENV_DEPLOYMENT_ID
            )));
        }
        if self.provider.version.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider.version is empty (env: {})",
                ENV_VERSION
            )));
        }
        for (name, env, url) in [
            ("provider.ml_url", ENV_ML_URL, &self.provider.ml_url),
            ("provider.iam_url", ENV_IAM_URL, &self.provider.iam_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "{} must start with 'http://' or 'https://', got '{}' (env: {})",
                    name, url, env
                )));
            }
        }

        Ok(())
    }

    /// Log level from the observability section
    pub fn log_level(&self) -> &str {
        &self.observability.log_level
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
