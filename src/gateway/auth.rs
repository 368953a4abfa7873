//! Authenticated-user resolution. User authentication and API-key issuance
//! are explicitly out of scope (spec.md §1) — `AuthResolver` is the seam a
//! real deployment plugs a verifier into; `StaticKeyResolver` is a stub
//! fixture suitable for local use and tests.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait AuthResolver: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> Result<String, GatewayError>;
}

/// Maps a fixed set of API keys to user ids, no expiry or rotation.
pub struct StaticKeyResolver {
    keys: HashMap<String, String>,
}

impl StaticKeyResolver {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl AuthResolver for StaticKeyResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<String, GatewayError> {
        self.keys
            .get(bearer_token)
            .cloned()
            .ok_or(GatewayError::AuthInvalid)
    }
}

pub fn extract_bearer(header_value: Option<&str>) -> Result<&str, GatewayError> {
    header_value
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::AuthRequired)
}
