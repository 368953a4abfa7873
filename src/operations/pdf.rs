//! PDF runner (spec.md §4.4).

use chromiumoxide::page::Page;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;

pub async fn render(page: &Page) -> anyhow::Result<Vec<u8>> {
    let params = PrintToPdfParams::builder().print_background(true).build();
    let bytes = page.pdf(params).await?;
    Ok(bytes)
}
