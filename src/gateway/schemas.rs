//! Request DTOs and the validation constraints from spec.md §6.

use crate::error::GatewayError;
use crate::operations::json_extraction::ResponseType;
use crate::operations::scrape::ElementSpec;
use crate::operations::screenshot::ScreenshotOptions;
use serde::Deserialize;
use std::collections::HashMap;

fn validate_url(url: &str) -> Result<(), GatewayError> {
    if !crate::utils::is_valid_url(url) {
        return Err(GatewayError::Validation(
            "url must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(())
}

fn validate_wait_time(wait_time_ms: u32) -> Result<(), GatewayError> {
    if wait_time_ms > 5000 {
        return Err(GatewayError::Validation("waitTime must be between 0 and 5000 ms".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CommonRequest {
    pub url: String,
    #[serde(default, rename = "waitTime")]
    pub wait_time_ms: u32,
}

impl CommonRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        validate_url(&self.url)?;
        validate_wait_time(self.wait_time_ms)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LinksRequest {
    #[serde(flatten)]
    pub common: CommonRequest,
    #[serde(default = "default_true", rename = "includeExternal")]
    pub include_external: bool,
}

fn default_true() -> bool {
    true
}

impl LinksRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.common.validate()
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(flatten)]
    pub common: CommonRequest,
    pub elements: Vec<ElementSpec>,
    pub headers: Option<HashMap<String, String>>,
}

impl ScrapeRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.common.validate()?;
        if self.elements.is_empty() {
            return Err(GatewayError::Validation("elements must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    fn validate(&self) -> Result<(), GatewayError> {
        if !(100..=3840).contains(&self.width) {
            return Err(GatewayError::Validation("viewport.width must be in [100, 3840]".to_string()));
        }
        if !(100..=2160).contains(&self.height) {
            return Err(GatewayError::Validation("viewport.height must be in [100, 2160]".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotRequest {
    #[serde(flatten)]
    pub common: CommonRequest,
    pub viewport: Option<Viewport>,
    #[serde(default, rename = "screenshotOptions")]
    pub screenshot_options: ScreenshotOptions,
    #[serde(default)]
    pub base64: bool,
}

impl ScreenshotRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.common.validate()?;
        if let Some(viewport) = &self.viewport {
            viewport.validate()?;
        }
        if let Some(quality) = self.screenshot_options.quality
            && !(1..=100).contains(&quality)
        {
            return Err(GatewayError::Validation("screenshotOptions.quality must be in [1, 100]".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct PdfRequest {
    #[serde(flatten)]
    pub common: CommonRequest,
    #[serde(default)]
    pub base64: bool,
}

impl PdfRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.common.validate()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_limit() -> u32 {
    5
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        let len = self.query.chars().count();
        if !(1..=500).contains(&len) {
            return Err(GatewayError::Validation("query must be 1..500 characters".to_string()));
        }
        if !(1..=10).contains(&self.limit) {
            return Err(GatewayError::Validation("limit must be in [1, 10]".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonExtractionRequest {
    #[serde(flatten)]
    pub common: CommonRequest,
    #[serde(default = "default_response_type", rename = "responseType")]
    pub response_type: ResponseType,
    pub prompt: Option<String>,
    #[serde(rename = "response_format")]
    pub response_format: Option<serde_json::Value>,
    pub instructions: Option<String>,
}

fn default_response_type() -> ResponseType {
    ResponseType::Json
}

impl JsonExtractionRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.common.validate()?;

        if let Some(prompt) = &self.prompt {
            let len = prompt.chars().count();
            if !(1..=1000).contains(&len) {
                return Err(GatewayError::Validation("prompt must be 1..1000 characters".to_string()));
            }
        }
        if let Some(instructions) = &self.instructions
            && instructions.chars().count() > 500
        {
            return Err(GatewayError::Validation("instructions must be at most 500 characters".to_string()));
        }

        match self.response_type {
            ResponseType::Text => {
                if self.prompt.is_none() {
                    return Err(GatewayError::Validation("prompt is required when responseType=text".to_string()));
                }
                if self.response_format.is_some() {
                    return Err(GatewayError::Validation(
                        "response_format is forbidden when responseType=text".to_string(),
                    ));
                }
            }
            ResponseType::Json => {
                if self.prompt.is_none() && self.response_format.is_none() {
                    return Err(GatewayError::Validation(
                        "either prompt or response_format is required when responseType=json".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListFilesQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteFileQuery {
    pub also_from_storage: Option<bool>,
}
