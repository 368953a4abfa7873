//! Shared wire/data-model types (spec.md §3 and §6 Envelope shape).

use serde::{Deserialize, Serialize};

/// `{ kind: screenshot | pdf }` — the two artifact-producing operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Screenshot,
    Pdf,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshot",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::Pdf => "pdf",
        }
    }
}

/// Persistent record of one artifact write, owned by a `UserActor`. Columns
/// match spec.md §3 exactly; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    pub id: String,
    pub kind: String,
    pub source_url: String,
    pub filename: String,
    pub object_key: String,
    pub public_url: String,
    pub metadata_json: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One web-search hit, after per-engine parsing and before/after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: SearchEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    Duckduckgo,
    Startpage,
    Bing,
}

impl SearchEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchEngine::Duckduckgo => "duckduckgo",
            SearchEngine::Startpage => "startpage",
            SearchEngine::Bing => "bing",
        }
    }
}

/// The uniform gateway response wrapper (spec.md §6).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<T: Serialize> {
    Success {
        success: bool,
        data: T,
        #[serde(rename = "creditsCost")]
        credits_cost: u32,
    },
    Failure {
        success: bool,
        error: EnvelopeError,
        #[serde(rename = "creditsCost")]
        credits_cost: u32,
    },
}

#[derive(Debug, Serialize)]
pub struct EnvelopeError {
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T, credits_cost: u32) -> Self {
        Envelope::Success {
            success: true,
            data,
            credits_cost,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }
}

impl Envelope<serde_json::Value> {
    pub fn failure(message: impl Into<String>) -> Self {
        Envelope::Failure {
            success: false,
            error: EnvelopeError {
                message: message.into(),
            },
            credits_cost: 0,
        }
    }
}
