//! One runner per operation kind: leases a page, navigates, post-processes
//! (spec.md §4.4). Every runner method returns `Ok(data)` for a success
//! envelope or `Err` for a failure envelope — the caller (the gateway
//! handler) is responsible for converting `Err` into `{success:false,...}`
//! without ever letting it become a bare HTTP 5xx, per the common failure
//! policy.

pub mod content;
pub mod json_extraction;
pub mod links;
pub mod markdown;
pub mod pdf;
pub mod scrape;
pub mod screenshot;

use crate::browser::{PageHarden, ResourcePolicy, SessionPool};
use crate::clock::IdSource;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const SCRAPE_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OperationRunner<'a> {
    pool: &'a SessionPool,
    ai_endpoint: String,
    ai_api_key: Option<String>,
}

impl<'a> OperationRunner<'a> {
    pub fn new(pool: &'a SessionPool, ai_endpoint: String, ai_api_key: Option<String>) -> Self {
        Self {
            pool,
            ai_endpoint,
            ai_api_key,
        }
    }

    pub async fn markdown(&self, url: &str, wait_time_ms: u32, ids: &dyn IdSource) -> anyhow::Result<Value> {
        let lease = self.pool.lease(ids, ResourcePolicy::BlockNonEssential).await?;
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;
        let html = lease.page().content().await?;
        let output = markdown::render(&html)?;
        Ok(json!({ "markdown": output.markdown, "wordCount": output.word_count }))
    }

    pub async fn content(&self, url: &str, wait_time_ms: u32, ids: &dyn IdSource) -> anyhow::Result<Value> {
        let lease = self.pool.lease(ids, ResourcePolicy::BlockNonEssential).await?;
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;
        let html = lease.page().content().await?;
        let output = content::render(html);
        Ok(json!({ "html": output.html, "contentType": output.content_type }))
    }

    pub async fn links(
        &self,
        url: &str,
        include_external: bool,
        wait_time_ms: u32,
        ids: &dyn IdSource,
    ) -> anyhow::Result<Value> {
        let lease = self.pool.lease(ids, ResourcePolicy::BlockNonEssential).await?;
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;
        let hrefs = links::collect_hrefs(lease.page()).await?;
        let output = links::build_output(hrefs, url, include_external)?;
        Ok(serde_json::to_value(output)?)
    }

    pub async fn scrape(
        &self,
        url: &str,
        elements: &[scrape::ElementSpec],
        extra_headers: Option<&std::collections::HashMap<String, String>>,
        wait_time_ms: u32,
        ids: &dyn IdSource,
    ) -> anyhow::Result<Value> {
        let lease = self.pool.lease(ids, ResourcePolicy::BlockNonEssential).await?;
        if let Some(headers) = extra_headers {
            set_extra_headers(lease.page(), headers).await?;
        }
        PageHarden::goto_with_retry(lease.page(), url, SCRAPE_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;

        let mut all = Vec::new();
        for spec in elements {
            all.extend(scrape::scrape_selector(lease.page(), spec).await?);
        }
        Ok(json!({ "elements": all }))
    }

    pub async fn screenshot(
        &self,
        url: &str,
        options: &screenshot::ScreenshotOptions,
        viewport: Option<(u32, u32)>,
        wait_time_ms: u32,
        ids: &dyn IdSource,
    ) -> anyhow::Result<(Vec<u8>, &'static str)> {
        let lease = self.pool.lease(ids, ResourcePolicy::LoadEverything).await?;
        if let Some((width, height)) = viewport {
            set_viewport(lease.page(), width, height).await?;
        }
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;
        let (bytes, image_type) = screenshot::capture(lease.page(), options).await?;
        Ok((bytes, image_type.content_type()))
    }

    pub async fn pdf(&self, url: &str, wait_time_ms: u32, ids: &dyn IdSource) -> anyhow::Result<Vec<u8>> {
        let lease = self.pool.lease(ids, ResourcePolicy::LoadEverything).await?;
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;
        pdf::render(lease.page()).await
    }

    pub async fn json_extraction(
        &self,
        url: &str,
        req: JsonExtractionParams,
        wait_time_ms: u32,
        ids: &dyn IdSource,
    ) -> anyhow::Result<Value> {
        let lease = self.pool.lease(ids, ResourcePolicy::BlockNonEssential).await?;
        PageHarden::goto_with_retry(lease.page(), url, DEFAULT_NAVIGATION_TIMEOUT).await?;
        wait(wait_time_ms).await;

        let html = lease.page().content().await?;
        let markdown_output = markdown::render(&html)?;
        let (title, meta_description, json_ld_blocks) = read_page_metadata(lease.page()).await?;

        let extraction_req = json_extraction::ExtractionRequest {
            markdown: markdown_output.markdown,
            page_title: title,
            meta_description,
            page_url: url.to_string(),
            word_count: markdown_output.word_count,
            json_ld_blocks,
            response_type: req.response_type,
            prompt: req.prompt,
            response_format: req.response_format,
            instructions: req.instructions,
        };

        let prepared = json_extraction::prepare_content(&extraction_req);
        let outcome = json_extraction::call_ai(
            &self.ai_endpoint,
            self.ai_api_key.as_deref(),
            &extraction_req,
            &prepared.payload,
        )
        .await?;

        let extracted = match extraction_req.response_type {
            json_extraction::ResponseType::Text => json!({ "text": outcome.raw_content }),
            json_extraction::ResponseType::Json => json_extraction::tolerant_parse_json(&outcome.raw_content)
                .ok_or_else(|| anyhow::anyhow!("AI response was not valid JSON after cleanup"))?,
        };

        Ok(json!({
            "extracted": extracted,
            "metadata": {
                "inputTokens": outcome.input_tokens,
                "outputTokens": outcome.output_tokens,
                "originalContentTokens": prepared.original_content_tokens,
                "finalContentTokens": prepared.final_content_tokens,
                "contentTruncated": prepared.truncated,
            },
        }))
    }
}

async fn wait(wait_time_ms: u32) {
    if wait_time_ms > 0 {
        tokio::time::sleep(Duration::from_millis(wait_time_ms as u64)).await;
    }
}

pub struct JsonExtractionParams {
    pub response_type: json_extraction::ResponseType,
    pub prompt: Option<String>,
    pub response_format: Option<Value>,
    pub instructions: Option<String>,
}

async fn set_viewport(page: &chromiumoxide::Page, width: u32, height: u32) -> anyhow::Result<()> {
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
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
    Ok(())
}

async fn set_extra_headers(
    page: &chromiumoxide::Page,
    headers: &std::collections::HashMap<String, String>,
) -> anyhow::Result<()> {
    use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(serde_json::to_value(
        headers,
    )?)))
    .await?;
    Ok(())
}

const READ_METADATA_SCRIPT: &str = r#"
({
  title: document.title || '',
  metaDescription: (document.querySelector('meta[name="description"]') || {}).content || '',
  jsonLd: Array.from(document.querySelectorAll('script[type="application/ld+json"]')).map(s => s.textContent || ''),
})
"#;

#[derive(serde::Deserialize)]
struct PageMetadata {
    title: String,
    #[serde(rename = "metaDescription")]
    meta_description: String,
    #[serde(rename = "jsonLd")]
    json_ld: Vec<String>,
}

async fn read_page_metadata(page: &chromiumoxide::Page) -> anyhow::Result<(String, String, Vec<Value>)> {
    let metadata: PageMetadata = page.evaluate(READ_METADATA_SCRIPT).await?.into_value()?;
    let json_ld_blocks = metadata
        .json_ld
        .into_iter()
        .filter_map(|raw| serde_json::from_str::<Value>(&raw).ok())
        .collect();
    Ok((metadata.title, metadata.meta_description, json_ld_blocks))
}
