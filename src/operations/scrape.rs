//! Scrape runner: evaluate per-selector element capture, then a bespoke
//! HTML-to-text transform for each captured element (spec.md §4.4).

use chromiumoxide::Page;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

const MAX_ELEMENTS_PER_SELECTOR: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub selector: String,
    pub attributes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawElement {
    #[serde(rename = "outerHTML")]
    outer_html: String,
    rect: Rect,
    attributes: std::collections::HashMap<String, String>,
}

impl<'de> Deserialize<'de> for Rect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            top: f64,
            left: f64,
            width: f64,
            height: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Rect {
            top: raw.top,
            left: raw.left,
            width: raw.width,
            height: raw.height,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapedElement {
    pub selector: String,
    #[serde(rename = "outerHTML")]
    pub outer_html: String,
    pub text: String,
    pub rect: Rect,
    pub attributes: std::collections::HashMap<String, String>,
}

fn build_script(spec: &ElementSpec) -> String {
    let attr_filter = match &spec.attributes {
        Some(attrs) => format!(
            "[{}]",
            attrs
                .iter()
                .map(|a| format!("\"{}\"", a.replace('"', "")))
                .collect::<Vec<_>>()
                .join(",")
        ),
        None => "null".to_string(),
    };

    format!(
        r#"
Array.from(document.querySelectorAll({selector:?})).slice(0, {max}).map(el => {{
  const rect = el.getBoundingClientRect();
  const filter = {attr_filter};
  const attributes = {{}};
  const names = filter ? filter : Array.from(el.attributes).map(a => a.name);
  for (const name of names) {{
    const value = el.getAttribute(name);
    if (value !== null) attributes[name] = value;
  }}
  return {{
    outerHTML: el.outerHTML,
    rect: {{ top: rect.top, left: rect.left, width: rect.width, height: rect.height }},
    attributes,
  }};
}})
"#,
        selector = spec.selector,
        max = MAX_ELEMENTS_PER_SELECTOR,
        attr_filter = attr_filter,
    )
}

pub async fn scrape_selector(page: &Page, spec: &ElementSpec) -> anyhow::Result<Vec<ScrapedElement>> {
    let script = build_script(spec);
    let raw: Vec<RawElement> = page.evaluate(script).await?.into_value()?;

    Ok(raw
        .into_iter()
        .map(|r| ScrapedElement {
            selector: spec.selector.clone(),
            text: html_to_text(&r.outer_html),
            outer_html: r.outer_html,
            rect: r.rect,
            attributes: r.attributes,
        })
        .collect())
}

/// Render `h1..h6` without uppercasing, lists without bullet/number
/// prefixes, `li` inline with no surrounding breaks, and join all resulting
/// non-empty lines with `", "`.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();

    let mut lines = Vec::new();
    collect_lines(*root, &mut lines);

    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn collect_lines(node: ego_tree::NodeRef<scraper::Node>, lines: &mut Vec<String>) {
    if let Some(text) = node.value().as_text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
        return;
    }

    if let Some(element) = node.value().as_element() {
        let is_list_item = element.name() == "li";
        let mut buf = String::new();
        for child in node.children() {
            if is_list_item {
                collect_inline(child, &mut buf);
            } else {
                collect_lines(child, lines);
            }
        }
        if is_list_item && !buf.trim().is_empty() {
            lines.push(buf.trim().to_string());
        }
        return;
    }

    for child in node.children() {
        collect_lines(child, lines);
    }
}

fn collect_inline(node: ego_tree::NodeRef<scraper::Node>, buf: &mut String) {
    if let Some(text) = node.value().as_text() {
        buf.push_str(text);
        return;
    }
    for child in node.children() {
        collect_inline(child, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_without_uppercasing() {
        let out = html_to_text("<h1>Hello World</h1>");
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn renders_list_items_inline_without_bullets() {
        let out = html_to_text("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(out, "one, two");
    }

    #[test]
    fn filters_empty_lines() {
        let out = html_to_text("<div><p>first</p><p>   </p><p>second</p></div>");
        assert_eq!(out, "first, second");
    }
}
