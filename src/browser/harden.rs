//! Pre-navigation page hardening (spec.md §4.3).
//!
//! Applied fresh on every lease — a reused session's page may carry residual
//! state from a previous caller, so none of this is skipped just because the
//! session itself was reused.

use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams,
    RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::clock::IdSource;

const STEALTH_SCRIPT: &str = include_str!("assets/stealth.js");

/// Six desktop viewport sizes hardening picks from uniformly at random.
pub const VIEWPORT_WHITELIST: &[(u32, u32)] = &[
    (1920, 1080),
    (1680, 1050),
    (1600, 900),
    (1536, 864),
    (1440, 900),
    (1366, 768),
];

const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

const RESOURCE_TYPES_TO_BLOCK: &[ResourceType] = &[
    ResourceType::Image,
    ResourceType::Media,
    ResourceType::Font,
    ResourceType::Stylesheet,
];

/// Whether a freshly hardened page should have images/media/fonts/CSS
/// blocked (content/link/scrape/JSON operations) or loaded in full
/// (screenshot/PDF, where visual fidelity depends on every resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePolicy {
    BlockNonEssential,
    LoadEverything,
}

/// A background interceptor task, owned by the caller so it can be aborted
/// when the page is released.
pub struct RequestRouter {
    handle: JoinHandle<()>,
}

impl Drop for RequestRouter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct PageHarden;

impl PageHarden {
    /// Apply UA/header spoofing, a randomized viewport, the stealth payload,
    /// and (conditionally) a resource-blocking router. Returns the router
    /// guard when one was installed so the caller can keep it alive for the
    /// lifetime of the page.
    pub async fn apply(
        page: &Page,
        ids: &dyn IdSource,
        resource_policy: ResourcePolicy,
    ) -> anyhow::Result<Option<RequestRouter>> {
        let (width, height) = VIEWPORT_WHITELIST[ids.next_index(VIEWPORT_WHITELIST.len())];

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(width as i64)
                .height(height as i64)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(|e| anyhow::anyhow!(e))?,
        )
        .await?;

        Self::set_headers(page).await?;

        let harden_config = format!(
            "window.__weblinqHarden = {{ viewportWidth: {width}, viewportHeight: {height}, \
             languages: [\"en-US\", \"en\"], webglVendor: \"Intel Inc.\", \
             webglRenderer: \"Intel Iris OpenGL Engine\" }};"
        );
        page.execute(AddScriptToEvaluateOnNewDocumentParams::builder().source(harden_config).build()
            .map_err(|e| anyhow::anyhow!(e))?)
            .await?;
        page.execute(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(STEALTH_SCRIPT)
                .build()
                .map_err(|e| anyhow::anyhow!(e))?,
        )
        .await?;

        let router = match resource_policy {
            ResourcePolicy::LoadEverything => None,
            ResourcePolicy::BlockNonEssential => Some(Self::install_request_router(page).await?),
        };

        Ok(router)
    }

    async fn set_headers(page: &Page) -> anyhow::Result<()> {
        use chromiumoxide::cdp::browser_protocol::network::SetExtraHttpHeadersParams;
        use chromiumoxide::cdp::browser_protocol::network::Headers;
        use std::collections::HashMap;

        let mut headers = HashMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        );
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        headers.insert("sec-ch-ua".to_string(), "\"Chromium\";v=\"132\", \"Not_A Brand\";v=\"24\"".to_string());
        headers.insert("sec-ch-ua-mobile".to_string(), "?0".to_string());
        headers.insert("sec-ch-ua-platform".to_string(), "\"Windows\"".to_string());
        headers.insert("sec-fetch-dest".to_string(), "document".to_string());
        headers.insert("sec-fetch-mode".to_string(), "navigate".to_string());
        headers.insert("sec-fetch-site".to_string(), "none".to_string());

        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::to_value(headers)?,
        )))
        .await?;

        page.execute(
            chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams::builder()
                .user_agent(DESKTOP_UA)
                .accept_language("en-US,en;q=0.9")
                .platform("Win32")
                .build()
                .map_err(|e| anyhow::anyhow!(e))?,
        )
        .await?;

        Ok(())
    }

    async fn install_request_router(page: &Page) -> anyhow::Result<RequestRouter> {
        let patterns: Vec<RequestPattern> = vec![RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Request)
            .build()];

        page.execute(FetchEnableParams::builder().patterns(patterns).build())
            .await?;

        let mut events = page.event_listener::<EventRequestPaused>().await?;
        let page = page.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let blocked = RESOURCE_TYPES_TO_BLOCK.contains(&event.resource_type);

                let result = if blocked {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    match ContinueRequestParams::builder()
                        .request_id(event.request_id.clone())
                        .build()
                    {
                        Ok(params) => page.execute(params).await.map(|_| ()),
                        Err(e) => Err(chromiumoxide::error::CdpError::ChromeMessage(e)),
                    }
                };

                if let Err(e) = result {
                    tracing::trace!(error = %e, "request router respond error");
                }
            }
        });

        Ok(RequestRouter { handle })
    }

    pub fn is_retryable_navigation_error(message: &str) -> bool {
        const RETRYABLE_SUBSTRINGS: &[&str] = &[
            "ERR_CONNECTION_CLOSED",
            "ERR_NETWORK_CHANGED",
            "ERR_CONNECTION_RESET",
            "ERR_TIMED_OUT",
        ];
        RETRYABLE_SUBSTRINGS.iter().any(|s| message.contains(s))
            || message.contains("net::ERR")
            || message.contains("timeout")
    }

    pub fn backoff_delay(attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(2))
    }

    /// Navigate with up to 3 attempts, exponential backoff 1s/2s/4s. Only
    /// retryable-classified errors are retried; anything else surfaces
    /// immediately.
    pub async fn goto_with_retry(
        page: &Page,
        url: &str,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let mut last_err = None;
        for attempt in 0..3u32 {
            let result = tokio::time::timeout(timeout, page.goto(url)).await;
            match result {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => {
                    let message = e.to_string();
                    if !Self::is_retryable_navigation_error(&message) {
                        return Err(anyhow::anyhow!(message));
                    }
                    last_err = Some(message);
                }
                Err(_) => {
                    last_err = Some("timeout".to_string());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(Self::backoff_delay(attempt)).await;
            }
        }
        Err(anyhow::anyhow!(
            "navigation to {url} failed after 3 attempts: {}",
            last_err.unwrap_or_default()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_retryable_substrings() {
        assert!(PageHarden::is_retryable_navigation_error("net::ERR_CONNECTION_RESET"));
        assert!(PageHarden::is_retryable_navigation_error("Navigation timeout of 30000 ms exceeded"));
        assert!(PageHarden::is_retryable_navigation_error("some net::ERR_WEIRD thing"));
    }

    #[test]
    fn does_not_retry_unrelated_errors() {
        assert!(!PageHarden::is_retryable_navigation_error("ERR_NAME_NOT_RESOLVED_PERMANENTLY_BANNED"));
        assert!(!PageHarden::is_retryable_navigation_error("selector not found"));
    }

    #[test]
    fn backoff_doubles_up_to_4s() {
        assert_eq!(PageHarden::backoff_delay(0), Duration::from_secs(1));
        assert_eq!(PageHarden::backoff_delay(1), Duration::from_secs(2));
        assert_eq!(PageHarden::backoff_delay(2), Duration::from_secs(4));
    }
}
