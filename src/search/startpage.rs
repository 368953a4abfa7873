//! Startpage fetch + parse (spec.md §4.5).

use super::http::fetch_text;
use crate::clock::IdSource;
use crate::model::{SearchEngine, SearchResult};
use scraper::{ElementRef, Html, Selector};

pub async fn search(query: &str, ids: &dyn IdSource) -> anyhow::Result<Vec<SearchResult>> {
    let encoded = urlencoding::encode(query);
    let url = format!("https://www.startpage.com/sp/search?query={encoded}");
    let html = fetch_text(&url, ids).await?;
    Ok(parse(&html))
}

/// Link text with `img`/`svg` subtrees excluded, mirroring a DOM clone that
/// strips those elements before reading `textContent`.
fn link_text_excluding_media(el: ElementRef) -> String {
    let mut out = String::new();
    collect_text(*el, &mut out);
    out.trim().to_string()
}

fn collect_text(node: ego_tree::NodeRef<scraper::Node>, out: &mut String) {
    if let Some(element) = node.value().as_element()
        && matches!(element.name(), "img" | "svg")
    {
        return;
    }
    if let Some(text) = node.value().as_text() {
        out.push_str(text);
    }
    for child in node.children() {
        collect_text(child, out);
    }
}

fn parse(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(
        ".w-gl__result, .result-item, .search-result, .result, article.result, [data-testid='result']",
    )
    .unwrap();
    let title_sel = Selector::parse("[data-testid='result-title-a']").unwrap();
    let any_link_sel = Selector::parse("a[href^='http']").unwrap();
    let snippet_sel = Selector::parse(".search-result__text, .w-gl__description, p").unwrap();

    let mut results = Vec::new();
    for result in document.select(&result_sel) {
        let link = result
            .select(&title_sel)
            .next()
            .or_else(|| result.select(&any_link_sel).next());
        let Some(link) = link else { continue };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = link_text_excluding_media(link);
        if title.is_empty() {
            continue;
        }
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url: href.to_string(),
            snippet,
            source: SearchEngine::Startpage,
        });
    }
    results
}
