//! JSON-extraction runner: markdown → prompt payload → token-budgeted
//! truncation → AI call → tolerant JSON cleanup (spec.md §4.4).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_CONTEXT_TOKENS: usize = 24_000;
const RESPONSE_RESERVE_TOKENS: usize = 4_096;
const SAFETY_MARGIN_TOKENS: usize = 500;
const MAX_CONTENT_TOKENS: usize = MAX_CONTEXT_TOKENS - RESPONSE_RESERVE_TOKENS - SAFETY_MARGIN_TOKENS;
const TRUNCATION_MARKER: &str = "[Content truncated due to length...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Text,
}

pub struct ExtractionRequest {
    pub markdown: String,
    pub page_title: String,
    pub meta_description: String,
    pub page_url: String,
    pub word_count: usize,
    pub json_ld_blocks: Vec<Value>,
    pub response_type: ResponseType,
    pub prompt: Option<String>,
    pub response_format: Option<Value>,
    pub instructions: Option<String>,
}

pub struct PreparedContent {
    pub payload: String,
    pub original_content_tokens: usize,
    pub final_content_tokens: usize,
    pub truncated: bool,
}

fn count_tokens(text: &str) -> usize {
    match tiktoken_rs::cl100k_base() {
        Ok(bpe) => bpe.encode_ordinary(text).len(),
        Err(_) => (text.chars().count() as f64 / 4.0).ceil() as usize,
    }
}

fn build_payload(req: &ExtractionRequest) -> String {
    let json_ld_section = if req.json_ld_blocks.is_empty() {
        String::new()
    } else {
        let rendered = req
            .json_ld_blocks
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        format!("{rendered}\n\n")
    };

    format!(
        "Page Title: {}\nMeta Description: {}\nPage URL: {}\nWord Count: {}\n\n{}Page Content (Structured Markdown):\n{}",
        req.page_title, req.meta_description, req.page_url, req.word_count, json_ld_section, req.markdown
    )
}

/// Truncate by dropping whole paragraphs from the tail until the payload
/// fits `MAX_CONTENT_TOKENS`, appending a marker if anything was dropped.
pub fn prepare_content(req: &ExtractionRequest) -> PreparedContent {
    let payload = build_payload(req);
    let original_tokens = count_tokens(&payload);

    if original_tokens <= MAX_CONTENT_TOKENS {
        return PreparedContent {
            final_content_tokens: original_tokens,
            payload,
            original_content_tokens: original_tokens,
            truncated: false,
        };
    }

    let mut paragraphs: Vec<&str> = payload.split("\n\n").collect();
    loop {
        if paragraphs.len() <= 1 {
            break;
        }
        paragraphs.pop();
        let candidate = paragraphs.join("\n\n");
        let with_marker = format!("{candidate}\n\n{TRUNCATION_MARKER}");
        if count_tokens(&with_marker) <= MAX_CONTENT_TOKENS {
            let final_tokens = count_tokens(&with_marker);
            return PreparedContent {
                payload: with_marker,
                original_content_tokens: original_tokens,
                final_content_tokens: final_tokens,
                truncated: true,
            };
        }
    }

    let fallback = format!("{}\n\n{TRUNCATION_MARKER}", paragraphs.join("\n\n"));
    let final_tokens = count_tokens(&fallback);
    PreparedContent {
        payload: fallback,
        original_content_tokens: original_tokens,
        final_content_tokens: final_tokens,
        truncated: true,
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEnvelope {
    choices: Vec<OpenAiChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    response: Value,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct Usage {
    #[serde(default, alias = "prompt_tokens")]
    input_tokens: u32,
    #[serde(default, alias = "completion_tokens")]
    output_tokens: u32,
}

pub struct ChatOutcome {
    pub raw_content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// response_format forcing per the (responseType, prompt-present,
/// response_format-present) truth table in spec.md §4.4.
fn resolve_force_json(req: &ExtractionRequest) -> Option<Value> {
    if req.response_type != ResponseType::Json {
        return None;
    }
    match &req.response_format {
        Some(schema) => Some(schema.clone()),
        None => Some(serde_json::json!({ "type": "json_object" })),
    }
}

pub async fn call_ai(
    endpoint: &str,
    api_key: Option<&str>,
    req: &ExtractionRequest,
    content_payload: &str,
) -> anyhow::Result<ChatOutcome> {
    let instructions = req.instructions.as_deref().unwrap_or("");
    let prompt = req.prompt.as_deref().unwrap_or("Extract structured information from this page.");

    let user_message = format!("{instructions}\n\n{prompt}\n\n{content_payload}");

    let body = ChatRequest {
        messages: vec![ChatMessage {
            role: "user",
            content: user_message,
        }],
        max_tokens: 4096,
        temperature: 0.1,
        response_format: resolve_force_json(req),
    };

    let client = reqwest::Client::new();
    let mut request = client.post(endpoint).json(&body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!("AI endpoint returned status {}", response.status()));
    }

    let body: Value = response.json().await?;

    if let Ok(openai) = serde_json::from_value::<OpenAiEnvelope>(body.clone()) {
        let content = openai
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("AI response had no choices"))?;
        let usage = openai.usage.unwrap_or(Usage { input_tokens: 0, output_tokens: 0 });
        return Ok(ChatOutcome {
            raw_content: content,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        });
    }

    if let Ok(legacy) = serde_json::from_value::<LegacyEnvelope>(body) {
        let content = match legacy.response {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let usage = legacy.usage.unwrap_or(Usage { input_tokens: 0, output_tokens: 0 });
        return Ok(ChatOutcome {
            raw_content: content,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        });
    }

    Err(anyhow::anyhow!("AI response matched neither OpenAI nor legacy envelope shape"))
}

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap());
static GREEDY_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Tolerant JSON parse: direct parse, then fenced-code stripping, then a
/// brace-depth walk honoring string state, then a greedy regex fallback.
pub fn tolerant_parse_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(caps) = CODE_FENCE_RE.captures(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(caps[1].trim())
    {
        return Some(value);
    }

    if let Some(substr) = walk_outermost_object(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(&substr)
    {
        return Some(value);
    }

    if let Some(mat) = GREEDY_OBJECT_RE.find(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(mat.as_str())
    {
        return Some(value);
    }

    None
}

fn walk_outermost_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(markdown: &str) -> ExtractionRequest {
        ExtractionRequest {
            markdown: markdown.to_string(),
            page_title: "Title".to_string(),
            meta_description: "Desc".to_string(),
            page_url: "https://example.com".to_string(),
            word_count: 2,
            json_ld_blocks: vec![],
            response_type: ResponseType::Json,
            prompt: Some("extract".to_string()),
            response_format: None,
            instructions: None,
        }
    }

    #[test]
    fn short_content_is_not_truncated() {
        let prepared = prepare_content(&req("short content"));
        assert!(!prepared.truncated);
        assert_eq!(prepared.original_content_tokens, prepared.final_content_tokens);
    }

    #[test]
    fn long_content_gets_truncated_with_marker() {
        let huge = "word ".repeat(60_000);
        let prepared = prepare_content(&req(&huge));
        assert!(prepared.truncated);
        assert!(prepared.payload.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn parses_direct_json() {
        let value = tolerant_parse_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_json_wrapped_in_code_fence() {
        let value = tolerant_parse_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_json_surrounded_by_prose() {
        let value = tolerant_parse_json("Sure, here it is: {\"a\": 1} — hope that helps").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn brace_walker_handles_escaped_quotes_in_strings() {
        let raw = r#"prefix {"a": "he said \"hi\"", "b": {"c": 1}} suffix"#;
        let value = tolerant_parse_json(raw).unwrap();
        assert_eq!(value["a"], "he said \"hi\"");
        assert_eq!(value["b"]["c"], 1);
    }

    #[test]
    fn force_json_object_when_no_schema_and_prompt_present() {
        let force = resolve_force_json(&req("x"));
        assert_eq!(force, Some(serde_json::json!({"type": "json_object"})));
    }
}
