//! Markdown runner: sanitize → HTML pre-pass → htmd conversion → markdown
//! post-processing pipeline (spec.md §4.4, transforms a–f).

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static HEADING_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/?)h([7-9]|[1-9]\d+)(\s[^>]*)?>").unwrap());
static PROTOCOL_RELATIVE_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=(["'])//"#).unwrap());
static NEWLINE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn word_count(markdown: &str) -> usize {
    WORD_RE.find_iter(markdown).count()
}

/// Sanitize with an allowlist covering standard prose tags plus
/// `img[src|alt|title|width|height|loading]` and `http|https|data` schemes.
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .add_tags(["img"])
        .add_tag_attributes("img", ["src", "alt", "title", "width", "height", "loading"])
        .url_schemes(["http", "https", "data"].into_iter().collect())
        .clean(html)
        .to_string()
}

/// (a) demote headings deeper than level 6; (b) rewrite protocol-relative
/// anchor hrefs to an explicit `https:` scheme. Done as a pre-pass over the
/// sanitized HTML string, before it ever reaches the markdown converter.
fn demote_and_rewrite(html: &str) -> String {
    let demoted = HEADING_TAG_RE.replace_all(html, |caps: &regex::Captures| {
        let closing = &caps[1];
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        format!("<{closing}h6{attrs}>")
    });
    PROTOCOL_RELATIVE_HREF_RE
        .replace_all(&demoted, "href=${1}https://")
        .into_owned()
}

fn convert_to_markdown(html: &str) -> anyhow::Result<String> {
    htmd::HtmlToMarkdown::builder()
        .build()
        .convert(html)
        .map_err(|e| anyhow::anyhow!("markdown conversion failed: {e}"))
}

/// (c)–(f) operate on the converted markdown's paragraph blocks (text split
/// on blank lines), where "paragraph" also covers a lone heading line.
fn postprocess_markdown(markdown: &str) -> String {
    let blocks: Vec<&str> = markdown.split("\n\n").collect();
    let mut kept: Vec<String> = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        let trimmed = block.trim();

        // (c) paragraph immediately followed by a heading with identical text.
        if let Some(next) = blocks.get(i + 1) {
            let next_trimmed = next.trim();
            let next_heading_text = next_trimmed.trim_start_matches('#').trim();
            if !trimmed.starts_with('#')
                && next_trimmed.starts_with('#')
                && next_heading_text == trimmed
            {
                continue;
            }
        }

        // (d) links whose visible text is empty: `[](url)`.
        let block = remove_empty_link_text(&trimmed.to_string());

        // (e) collapse consecutive identical paragraphs.
        if let Some(last) = kept.last()
            && last.trim() == block.trim()
        {
            continue;
        }

        // (f) drop a trailing text node that merely echoes the preceding
        // link's URL, e.g. "[Example](https://x.com) https://x.com".
        let block = drop_trailing_url_echo(&block);

        kept.push(block);
    }

    let joined = kept.join("\n\n");
    NEWLINE_RUN_RE.replace_all(&joined, "\n\n").into_owned()
}

fn remove_empty_link_text(block: &str) -> String {
    static EMPTY_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\]\([^)]*\)").unwrap());
    EMPTY_LINK_RE.replace_all(block, "").into_owned()
}

fn drop_trailing_url_echo(block: &str) -> String {
    static TRAILING_ECHO_RE: Lazy<fancy_regex::Regex> = Lazy::new(|| {
        fancy_regex::Regex::new(r"(\[[^\]]*\]\((https?://[^\s)]+)\))\s+\2\s*$").unwrap()
    });
    TRAILING_ECHO_RE.replace(block, "$1").into_owned()
}

pub struct MarkdownOutput {
    pub markdown: String,
    pub word_count: usize,
}

pub fn render(raw_html: &str) -> anyhow::Result<MarkdownOutput> {
    let sanitized = sanitize_html(raw_html);
    let prepped = demote_and_rewrite(&sanitized);
    let converted = convert_to_markdown(&prepped)?;
    let markdown = postprocess_markdown(&converted);
    let word_count = word_count(&markdown);
    Ok(MarkdownOutput { markdown, word_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotes_headings_past_level_six() {
        let html = "<h7>Too deep</h7>";
        let out = demote_and_rewrite(html);
        assert_eq!(out, "<h6>Too deep</h6>");
    }

    #[test]
    fn rewrites_protocol_relative_hrefs() {
        let html = r#"<a href="//example.com/a">link</a>"#;
        let out = demote_and_rewrite(html);
        assert!(out.contains(r#"href="https://example.com/a""#));
    }

    #[test]
    fn collapses_three_or_more_newlines() {
        let out = postprocess_markdown("one\n\n\n\ntwo");
        assert_eq!(out, "one\n\ntwo");
    }

    #[test]
    fn removes_empty_link_text() {
        let out = remove_empty_link_text("see []() for details");
        assert_eq!(out, "see  for details");
    }

    #[test]
    fn counts_words_with_word_boundary_regex() {
        assert_eq!(word_count("Hello, world! 123"), 3);
    }

    #[test]
    fn collapses_consecutive_identical_paragraphs() {
        let out = postprocess_markdown("same text\n\nsame text\n\nother");
        assert_eq!(out, "same text\n\nother");
    }
}
