//! Shared HTTP fetch helper for the three search engines (spec.md §4.5).
//!
//! Randomizes UA/Accept-Language per request, retries transport errors and
//! non-2xx responses with exponential backoff. Grounded in the same
//! retry-with-backoff idiom the browser-driven search module used, adapted
//! to a plain `reqwest` client since engines are now fetched directly rather
//! than rendered.

use crate::clock::IdSource;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
];

const ACCEPT_LANGUAGES: &[&str] = &["en-US,en;q=0.9", "en-GB,en;q=0.9", "en;q=0.8"];

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("search http client")
});

/// GET `url`, retrying transport errors and non-2xx responses up to twice
/// with 1s/2s backoff.
pub async fn fetch_text(url: &str, ids: &dyn IdSource) -> anyhow::Result<String> {
    let ua = USER_AGENTS[ids.next_index(USER_AGENTS.len())];
    let lang = ACCEPT_LANGUAGES[ids.next_index(ACCEPT_LANGUAGES.len())];

    let mut last_err = None;
    for attempt in 0..3u32 {
        let response = CLIENT
            .get(url)
            .header("User-Agent", ua)
            .header("Accept-Language", lang)
            .header("Connection", "keep-alive")
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => return Ok(resp.text().await?),
            Ok(resp) => {
                last_err = Some(anyhow::anyhow!("non-2xx status: {}", resp.status()));
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(e));
            }
        }

        if attempt < 2 {
            tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("fetch failed with no captured error")))
}
