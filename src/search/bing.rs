//! Bing fetch + parse (spec.md §4.5).

use super::http::fetch_text;
use crate::clock::IdSource;
use crate::model::{SearchEngine, SearchResult};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;

const CAPTCHA_MARKERS: &[&str] = &["verify you are a human", "unusual traffic"];

pub async fn search(query: &str, ids: &dyn IdSource) -> anyhow::Result<Vec<SearchResult>> {
    let encoded = urlencoding::encode(query);
    let url = format!("https://www.bing.com/search?q={encoded}");

    let mut html = fetch_text(&url, ids).await?;
    if is_captcha(&html) {
        tokio::time::sleep(Duration::from_secs(5)).await;
        html = fetch_text(&url, ids).await?;
        if is_captcha(&html) {
            return Err(anyhow::anyhow!("bing presented a CAPTCHA/interstitial page"));
        }
    }

    Ok(parse(&html))
}

fn is_captcha(html: &str) -> bool {
    let lower = html.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|m| lower.contains(m))
}

fn clean_href(href: &str) -> String {
    if let Some(idx) = href.find("GLinkRedirect") {
        let rest = &href[idx..];
        if let Some(url_idx) = rest.find("url=") {
            let suffix = &rest[url_idx + 4..];
            let suffix = suffix.split('&').next().unwrap_or(suffix);
            if let Ok(decoded) = urlencoding::decode(suffix) {
                return decoded.into_owned();
            }
        }
    }

    for marker in ["?url=", "&url="] {
        if let Some(idx) = href.find(marker) {
            let suffix = &href[idx + marker.len()..];
            let suffix = suffix.split('&').next().unwrap_or(suffix);
            if let Ok(decoded) = urlencoding::decode(suffix)
                && decoded.starts_with("http")
            {
                return decoded.into_owned();
            }
        }
    }

    href.to_string()
}

fn parse(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);

    let layers: &[&str] = &[
        ".b_algo h2 a[href^='http']",
        "#b_results li a[href^='http']",
        "#b_content a[href^='http']",
    ];

    let mut results = Vec::new();
    let mut seen = HashSet::new();

    for selector_str in layers {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for link in document.select(&selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let title = link.text().collect::<String>().trim().to_string();
            if title.chars().count() < 5 {
                continue;
            }
            let cleaned = clean_href(href);
            if !seen.insert(cleaned.clone()) {
                continue;
            }
            results.push(SearchResult {
                title,
                url: cleaned,
                snippet: String::new(),
                source: SearchEngine::Bing,
            });
        }
        if !results.is_empty() {
            break;
        }
    }

    results
}
