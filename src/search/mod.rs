//! Fans a query out to three engines, rate-limits per client IP, parses
//! each tolerantly, dedupes and reranks (spec.md §4.5).

mod bing;
mod duckduckgo;
mod http;
mod ratelimit;
mod startpage;
pub mod types;

use crate::clock::IdSource;
use crate::model::{SearchEngine, SearchResult};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use types::{ScoredResult, SearchResponse};
use url::Url;

pub use ratelimit::SearchRateLimiter;

const STAGGER: &[Duration] = &[Duration::ZERO, Duration::from_millis(500), Duration::from_millis(1000)];

pub struct SearchAggregator {
    limiter: SearchRateLimiter,
}

impl SearchAggregator {
    pub fn new(limiter: SearchRateLimiter) -> Self {
        Self { limiter }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        client_ip: IpAddr,
        ids: &dyn IdSource,
    ) -> anyhow::Result<SearchResponse> {
        let start = Instant::now();
        let engines = [
            SearchEngine::Duckduckgo,
            SearchEngine::Startpage,
            SearchEngine::Bing,
        ];

        let mut handles = Vec::new();
        for (engine, delay) in engines.iter().copied().zip(STAGGER.iter().copied()) {
            if !self.limiter.check(client_ip, engine) {
                continue;
            }
            let query = query.to_string();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                run_engine(engine, &query).await
            }));
        }

        let mut all_results = Vec::new();
        let mut sources = Vec::new();

        for handle in handles {
            match handle.await {
                Ok((engine, Ok(results))) => {
                    if !results.is_empty() {
                        sources.push(engine);
                    }
                    all_results.extend(results);
                }
                Ok((engine, Err(e))) => {
                    tracing::warn!(engine = engine.as_str(), error = %e, "search engine failed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "search engine task panicked");
                }
            }
        }

        if all_results.is_empty() {
            return Err(anyhow::anyhow!("No search results"));
        }

        let results = dedupe_and_rank(all_results, limit);

        Ok(SearchResponse {
            query: query.to_string(),
            results,
            sources,
            search_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn run_engine(engine: SearchEngine, query: &str) -> (SearchEngine, anyhow::Result<Vec<SearchResult>>) {
    let ids = crate::clock::OsRand;
    let result = match engine {
        SearchEngine::Duckduckgo => duckduckgo::search(query, &ids).await,
        SearchEngine::Startpage => startpage::search(query, &ids).await,
        SearchEngine::Bing => bing::search(query, &ids).await,
    };
    (engine, result)
}

fn dedupe_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(format!("{}{}", parsed.origin().ascii_serialization(), parsed.path()))
}

fn host_bonus(url: &str) -> f64 {
    let lower = url.to_lowercase();
    let mut bonus = 0.0;
    if lower.contains("wikipedia") {
        bonus += 30.0;
    }
    if lower.contains("stackoverflow") {
        bonus += 25.0;
    }
    if lower.contains("github") {
        bonus += 20.0;
    }
    if lower.contains(".edu") || lower.contains(".gov") {
        bonus += 15.0;
    }
    bonus
}

fn source_bonus(source: SearchEngine) -> f64 {
    match source {
        SearchEngine::Startpage => 8.0,
        _ => 0.0,
    }
}

fn dedupe_and_rank(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut groups: HashMap<String, Vec<SearchResult>> = HashMap::new();
    for result in results {
        let key = dedupe_key(&result.url).unwrap_or_else(|| result.url.clone());
        groups.entry(key).or_default().push(result);
    }

    let mut scored: Vec<ScoredResult> = Vec::new();
    for (_, group) in groups {
        let group_size = group.len();
        let mut best: Option<(SearchResult, f64)> = None;
        for candidate in group {
            let score = (candidate.snippet.len() as f64 / 10.0).min(50.0)
                + group_size as f64 * 20.0
                + (100.0 - candidate.title.len() as f64).max(0.0)
                + host_bonus(&candidate.url)
                + source_bonus(candidate.source);

            if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                best = Some((candidate, score));
            }
        }
        if let Some((result, score)) = best {
            scored.push(ScoredResult { result, score });
        }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|s| s.result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SearchEngine;

    fn result(url: &str, title: &str, snippet: &str, source: SearchEngine) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            source,
        }
    }

    #[test]
    fn dedupes_by_origin_and_path() {
        let results = vec![
            result("https://example.com/a?x=1", "A", "short", SearchEngine::Duckduckgo),
            result("https://example.com/a?x=2", "A dup", "longer snippet here", SearchEngine::Bing),
        ];
        let ranked = dedupe_and_rank(results, 10);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn wikipedia_outranks_unbonused_result_of_similar_shape() {
        let results = vec![
            result("https://wikipedia.org/wiki/Rust", "Rust", "desc", SearchEngine::Duckduckgo),
            result("https://example.net/rust", "Rust", "desc", SearchEngine::Duckduckgo),
        ];
        let ranked = dedupe_and_rank(results, 10);
        assert_eq!(ranked[0].url, "https://wikipedia.org/wiki/Rust");
    }

    #[test]
    fn truncates_to_limit() {
        let results: Vec<SearchResult> = (0..5)
            .map(|i| result(&format!("https://example.com/{i}"), "T", "s", SearchEngine::Duckduckgo))
            .collect();
        let ranked = dedupe_and_rank(results, 2);
        assert_eq!(ranked.len(), 2);
    }
}
