//! Shared data types for the search fan-out.

use crate::model::{SearchEngine, SearchResult};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub sources: Vec<SearchEngine>,
    #[serde(rename = "searchTime")]
    pub search_time_ms: u64,
}

pub(crate) struct ScoredResult {
    pub result: SearchResult,
    pub score: f64,
}
