//! Environment-variable loader and validation for `GatewayConfig`.
//!
//! A missing variable falls back to the matching `Default` value; a
//! *present but malformed* variable (e.g. a non-numeric duration) is a
//! startup error, surfaced to `main` as `exit code 1` per spec.md §6.

use super::types::GatewayConfig;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64_secs(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(Duration::from_secs(default_secs)),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError(format!("{key} must be an integer number of seconds, got {raw:?}"))),
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|_| ConfigError(format!("{key} must be a positive integer, got {raw:?}"))),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

/// Load configuration from the process environment, validating as it goes.
pub fn from_env() -> Result<GatewayConfig, ConfigError> {
    let defaults = GatewayConfig::default();

    let config = GatewayConfig {
        browser_endpoint: env_string("WEBLINQ_BROWSER_ENDPOINT", &defaults.browser_endpoint),
        browser_api_key: env_opt_string("WEBLINQ_BROWSER_API_KEY"),
        storage_bucket_url: env_string("WEBLINQ_STORAGE_BUCKET_URL", &defaults.storage_bucket_url),
        cdn_host_production: env_string("WEBLINQ_CDN_HOST_PRODUCTION", &defaults.cdn_host_production),
        cdn_host_preview: env_string("WEBLINQ_CDN_HOST_PREVIEW", &defaults.cdn_host_preview),
        is_preview: env_bool("WEBLINQ_IS_PREVIEW", defaults.is_preview),
        ai_endpoint: env_string("WEBLINQ_AI_ENDPOINT", &defaults.ai_endpoint),
        ai_api_key: env_opt_string("WEBLINQ_AI_API_KEY"),
        api_key_prefix: env_string("WEBLINQ_API_KEY_PREFIX", &defaults.api_key_prefix),
        user_db_dir: std::env::var("WEBLINQ_USER_DB_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or(defaults.user_db_dir),
        session_keep_alive: env_u64_secs("WEBLINQ_SESSION_KEEP_ALIVE_SECS", 600)?,
        rate_window: env_u64_secs("WEBLINQ_RATE_WINDOW_SECS", 60)?,
        rate_max_requests: env_u32("WEBLINQ_RATE_MAX_REQUESTS", 60)?,
        listen_addr: env_string("WEBLINQ_LISTEN_ADDR", &defaults.listen_addr),
    };

    if config.browser_endpoint.is_empty() {
        return Err(ConfigError("WEBLINQ_BROWSER_ENDPOINT must not be empty".to_string()));
    }
    if config.rate_max_requests == 0 {
        return Err(ConfigError("WEBLINQ_RATE_MAX_REQUESTS must be > 0".to_string()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_duration() {
        // SAFETY: tests run single-threaded within this module's process via
        // `cargo test`'s default harness isolation is not guaranteed across
        // modules, so this test only touches a key unique to itself.
        unsafe {
            std::env::set_var("WEBLINQ_SESSION_KEEP_ALIVE_SECS_TEST_UNIQUE", "not-a-number");
        }
        let result = env_u64_secs("WEBLINQ_SESSION_KEEP_ALIVE_SECS_TEST_UNIQUE", 600);
        unsafe {
            std::env::remove_var("WEBLINQ_SESSION_KEEP_ALIVE_SECS_TEST_UNIQUE");
        }
        assert!(result.is_err());
    }

    #[test]
    fn defaults_when_unset() {
        let d = env_u64_secs("WEBLINQ_DEFINITELY_UNSET_KEY", 42).unwrap();
        assert_eq!(d, Duration::from_secs(42));
    }
}
