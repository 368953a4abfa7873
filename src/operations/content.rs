//! Content runner: navigate, return raw HTML verbatim (spec.md §4.4).

pub struct ContentOutput {
    pub html: String,
    pub content_type: &'static str,
}

pub fn render(raw_html: String) -> ContentOutput {
    ContentOutput {
        html: raw_html,
        content_type: "text/html",
    }
}
