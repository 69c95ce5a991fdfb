//! API key classification and IAM form encoding

use crate::config::ProviderConfig;
use secrecy::{ExposeSecret, Secret};

/// API key value that switches the relay into network-free demo mode
pub const DEMO_API_KEY: &str = "DEMO_MODE";

/// Prefix carried by Cloud Pak for Data API keys
pub const CLOUD_PAK_KEY_PREFIX: &str = "cpd-apikey";

/// OAuth grant type sent with every API-key exchange
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Which authentication flow an API key selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyKind {
    /// The demo sentinel; no identity provider is contacted
    Demo,
    /// Cloud Pak for Data key, exchanged with `response_type=cloud_iam`
    CloudPak,
    /// Standard cloud API key
    Standard,
}

impl ApiKeyKind {
    /// Classify a raw API key
    pub fn classify(api_key: &str) -> Self {
        if api_key == DEMO_API_KEY {
            Self::Demo
        } else if api_key.starts_with(CLOUD_PAK_KEY_PREFIX) {
            Self::CloudPak
        } else {
            Self::Standard
        }
    }

    /// Label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::CloudPak => "cloud_pak",
            Self::Standard => "standard",
        }
    }
}

/// Credentials loaded once at startup and never mutated
#[derive(Debug, Clone)]
pub struct Credentials {
    api_key: Secret<String>,
    kind: ApiKeyKind,
    iam_url: String,
}

impl Credentials {
    pub fn new(api_key: Secret<String>, iam_url: impl Into<String>) -> Self {
        let kind = ApiKeyKind::classify(api_key.expose_secret());
        Self {
            api_key,
            kind,
            iam_url: iam_url.into(),
        }
    }

    pub fn from_config(provider: &ProviderConfig) -> Self {
        Self::new(provider.api_key().clone(), provider.iam_url())
    }

    pub fn kind(&self) -> ApiKeyKind {
        self.kind
    }

    pub fn is_demo(&self) -> bool {
        self.kind == ApiKeyKind::Demo
    }

    pub fn iam_url(&self) -> &str {
        &self.iam_url
    }

    /// Form fields for the token request
    ///
    /// Both shapes go to the same IAM endpoint; Cloud Pak keys additionally
    /// ask for a `cloud_iam` response.
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("grant_type", APIKEY_GRANT_TYPE),
            ("apikey", self.api_key.expose_secret().as_str()),
        ];
        if self.kind == ApiKeyKind::CloudPak {
            fields.push(("response_type", "cloud_iam"));
        }
        fields
    }
}
