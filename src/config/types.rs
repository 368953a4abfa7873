//! Gateway configuration.
//!
//! Every field here corresponds to an item spec.md §6 lists under
//! "Configuration". Loaded once at startup from environment variables
//! (`config::env::from_env`); invalid configuration is a startup error
//! (exit code 1), never a panic deep in a request handler.

use std::time::Duration;

/// Top-level gateway configuration, held behind an `Arc` in `AppState`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket endpoint of the remote browser-automation fleet.
    pub browser_endpoint: String,
    /// Bearer credential presented to the remote browser fleet, if any.
    pub browser_api_key: Option<String>,

    /// Object-storage bucket URL (e.g. `file:///var/lib/weblinq/artifacts`,
    /// or an `s3://bucket` URL once a cloud backend is configured).
    pub storage_bucket_url: String,

    /// Public CDN hostname artifacts are served from, production.
    pub cdn_host_production: String,
    /// Public CDN hostname artifacts are served from, preview deployments.
    pub cdn_host_preview: String,
    /// Whether this instance is a preview deployment (selects which CDN host
    /// `public_url` composition uses).
    pub is_preview: bool,

    /// Base URL of the AI model endpoint used by JSON extraction.
    pub ai_endpoint: String,
    /// Bearer credential for the AI endpoint.
    pub ai_api_key: Option<String>,

    /// Prefix every issued API key carries (used only to validate shape; key
    /// issuance itself is out of scope per spec.md §1).
    pub api_key_prefix: String,

    /// Directory holding one SQLite file per user actor.
    pub user_db_dir: std::path::PathBuf,

    /// How long a launched remote session is kept alive before the fleet
    /// idle-closes it. Default 600s per spec.md §3.
    pub session_keep_alive: Duration,

    /// Rate-bucket window for per-(ip, engine) search limiting. Default 60s.
    pub rate_window: Duration,
    /// Max requests per rate-bucket window. Default 60.
    pub rate_max_requests: u32,

    /// HTTP listen address, e.g. `0.0.0.0:8080`.
    pub listen_addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            browser_endpoint: "ws://127.0.0.1:9222".to_string(),
            browser_api_key: None,
            storage_bucket_url: "file:///tmp/weblinq-artifacts".to_string(),
            cdn_host_production: "cdn.weblinq.dev".to_string(),
            cdn_host_preview: "cdn-preview.weblinq.dev".to_string(),
            is_preview: false,
            ai_endpoint: "https://api.weblinq.dev/v1/chat/completions".to_string(),
            ai_api_key: None,
            api_key_prefix: "wlq_".to_string(),
            user_db_dir: std::path::PathBuf::from("/tmp/weblinq-users"),
            session_keep_alive: Duration::from_secs(600),
            rate_window: Duration::from_secs(60),
            rate_max_requests: 60,
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn cdn_host(&self) -> &str {
        if self.is_preview {
            &self.cdn_host_preview
        } else {
            &self.cdn_host_production
        }
    }
}
