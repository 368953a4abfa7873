//! DuckDuckGo fetch + parse (spec.md §4.5).
//!
//! Guarded by a process-wide mutex with a 2s gap enforced between calls —
//! DuckDuckGo is the most CAPTCHA-sensitive of the three engines.

use super::http::fetch_text;
use crate::clock::IdSource;
use crate::model::{SearchEngine, SearchResult};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

static LAST_CALL: Lazy<Mutex<Option<Instant>>> = Lazy::new(|| Mutex::new(None));
const MIN_GAP: Duration = Duration::from_secs(2);

pub async fn search(query: &str, ids: &dyn IdSource) -> anyhow::Result<Vec<SearchResult>> {
    {
        let mut last = LAST_CALL.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_GAP {
                tokio::time::sleep(MIN_GAP - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    let encoded = urlencoding::encode(query);
    let lite_url = format!("https://lite.duckduckgo.com/lite/?q={encoded}");
    let lite_html = fetch_text(&lite_url, ids).await?;
    let results = parse_lite(&lite_html);
    if !results.is_empty() {
        return Ok(results);
    }

    let full_url = format!("https://html.duckduckgo.com/html/?q={encoded}");
    let full_html = fetch_text(&full_url, ids).await?;
    Ok(parse_full(&full_html))
}

fn unwrap_redirect(href: &str) -> String {
    if href.contains("/l/?uddg=")
        && let Ok(url) = Url::parse(&format!("https://duckduckgo.com{href}")).or_else(|_| Url::parse(href))
        && let Some((_, value)) = url.query_pairs().find(|(k, _)| k == "uddg")
    {
        return value.into_owned();
    }
    href.to_string()
}

fn parse_lite(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("table tr").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let mut results = Vec::new();
    for row in document.select(&row_sel) {
        let Some(link) = row.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let url = unwrap_redirect(href);
        if !url.starts_with("http") {
            continue;
        }
        results.push(SearchResult {
            title,
            url,
            snippet: String::new(),
            source: SearchEngine::Duckduckgo,
        });
    }
    results
}

fn parse_full(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result, .result__body").unwrap();
    let link_sel = Selector::parse("a.result-link, a.result__a").unwrap();
    let any_link_sel = Selector::parse("a[href^='http']").unwrap();
    let snippet_sel = Selector::parse(".result__snippet").unwrap();

    let mut results = Vec::new();
    for result in document.select(&result_sel) {
        let link = result
            .select(&link_sel)
            .next()
            .or_else(|| result.select(&any_link_sel).next());
        let Some(link) = link else { continue };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url: unwrap_redirect(href),
            snippet,
            source: SearchEngine::Duckduckgo,
        });
    }
    results
}
