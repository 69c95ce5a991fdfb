//! Bearer-token acquisition from the identity provider
//!
//! The token is fetched lazily, cached in memory, and replaced when the
//! scoring endpoint rejects it.

pub mod credentials;
pub mod error;
pub mod token;

pub use credentials::{APIKEY_GRANT_TYPE, ApiKeyKind, CLOUD_PAK_KEY_PREFIX, Credentials, DEMO_API_KEY};
pub use error::AuthError;
pub use token::{BearerToken, DEMO_TOKEN, TokenManager};
