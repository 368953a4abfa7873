//! Screenshot runner (spec.md §4.4).

use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as CdpViewport};
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Jpeg,
    Webp,
}

impl ImageType {
    fn to_cdp(self) -> CaptureScreenshotFormat {
        match self {
            ImageType::Png => CaptureScreenshotFormat::Png,
            ImageType::Jpeg => CaptureScreenshotFormat::Jpeg,
            ImageType::Webp => CaptureScreenshotFormat::Webp,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
            ImageType::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ClipRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenshotOptions {
    #[serde(default = "default_type")]
    pub r#type: ImageType,
    #[serde(default = "default_true")]
    pub full_page: bool,
    pub quality: Option<u32>,
    pub omit_background: Option<bool>,
    #[serde(default)]
    pub optimize_for_speed: bool,
    pub clip: Option<ClipRegion>,
}

fn default_type() -> ImageType {
    ImageType::Png
}

fn default_true() -> bool {
    true
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            r#type: ImageType::Png,
            full_page: true,
            quality: None,
            omit_background: None,
            optimize_for_speed: false,
            clip: None,
        }
    }
}

pub async fn capture(page: &Page, options: &ScreenshotOptions) -> anyhow::Result<(Vec<u8>, ImageType)> {
    let (image_type, quality) = if options.optimize_for_speed && options.quality.is_none() {
        (ImageType::Jpeg, Some(50))
    } else {
        (options.r#type, options.quality)
    };

    let mut builder = ScreenshotParams::builder()
        .format(image_type.to_cdp())
        .full_page(options.full_page);

    if matches!(image_type, ImageType::Jpeg | ImageType::Webp)
        && let Some(quality) = quality
    {
        builder = builder.quality(quality as i64);
    }
    if let Some(omit) = options.omit_background {
        builder = builder.omit_background(omit);
    }
    if let Some(clip) = options.clip {
        builder = builder.clip(CdpViewport {
            x: clip.x,
            y: clip.y,
            width: clip.width,
            height: clip.height,
            scale: 1.0,
        });
    }

    let bytes = page.screenshot(builder.build()).await?;
    Ok((bytes, image_type))
}
