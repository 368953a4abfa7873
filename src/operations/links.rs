//! Links runner: evaluate in-page for `a[href]`, classify internal/external
//! (spec.md §4.4).

use chromiumoxide::Page;
use serde::Serialize;
use url::Url;

const COLLECT_HREFS_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('a[href]'))
  .map(a => a.getAttribute('href'))
  .filter(href => href && (href.startsWith('http://') || href.startsWith('https://')))
"#;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Internal,
    External,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkEntry {
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinksMetadata {
    #[serde(rename = "totalLinks")]
    pub total_links: usize,
    #[serde(rename = "internalLinks")]
    pub internal_links: usize,
    #[serde(rename = "externalLinks")]
    pub external_links: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinksOutput {
    pub links: Vec<LinkEntry>,
    pub metadata: LinksMetadata,
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// A link that fails to parse as a URL is treated as relative, hence
/// internal — it could not have come from a different origin.
fn classify(href: &str, base_host: &str) -> LinkType {
    match Url::parse(href) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) if strip_www(host) == strip_www(base_host) => LinkType::Internal,
            Some(_) => LinkType::External,
            None => LinkType::Internal,
        },
        Err(_) => LinkType::Internal,
    }
}

pub fn build_output(hrefs: Vec<String>, base_url: &str, include_external: bool) -> anyhow::Result<LinksOutput> {
    let base_host = Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let mut links: Vec<LinkEntry> = hrefs
        .into_iter()
        .map(|url| {
            let link_type = classify(&url, &base_host);
            LinkEntry { url, link_type }
        })
        .collect();

    if !include_external {
        links.retain(|l| l.link_type != LinkType::External);
    }

    let internal_links = links.iter().filter(|l| l.link_type == LinkType::Internal).count();
    let external_links = links.iter().filter(|l| l.link_type == LinkType::External).count();
    let total_links = links.len();

    Ok(LinksOutput {
        links,
        metadata: LinksMetadata {
            total_links,
            internal_links,
            external_links,
        },
    })
}

pub async fn collect_hrefs(page: &Page) -> anyhow::Result<Vec<String>> {
    let result: Vec<String> = page.evaluate(COLLECT_HREFS_SCRIPT).await?.into_value()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_same_host_as_internal() {
        assert_eq!(classify("https://example.com/a", "example.com"), LinkType::Internal);
    }

    #[test]
    fn strips_leading_www_before_comparing() {
        assert_eq!(classify("https://www.example.com/a", "example.com"), LinkType::Internal);
    }

    #[test]
    fn classifies_different_host_as_external() {
        assert_eq!(classify("https://other.com/a", "example.com"), LinkType::External);
    }

    #[test]
    fn unparseable_url_is_internal() {
        assert_eq!(classify("not a url", "example.com"), LinkType::Internal);
    }

    #[test]
    fn excludes_externals_when_requested() {
        let out = build_output(
            vec!["https://example.com/a".into(), "https://other.com/b".into()],
            "https://example.com",
            false,
        )
        .unwrap();
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.metadata.total_links, 1);
        assert_eq!(out.metadata.internal_links, 1);
        assert_eq!(out.metadata.external_links, 0);
    }
}
