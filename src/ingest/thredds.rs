//! THREDDS catalog page scraping.
//!
//! A Waterbase listing page links every sub-catalog (`01_Afvoer/`) and every
//! dataset file (`id1-AMRGBVN.nc`) through an anchor whose `href` points at a
//! `catalog.html` page. Navigation links, service links and the page footer
//! are filtered out by requiring the anchor text to start with two digits
//! (catalogs) or `id<digits>` (files).

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::ingest::HttpFetch;
use crate::model::DataError;

static ENTRY_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}|id\d+)").expect("entry pattern should be valid"));

/// Fetches a listing page and returns its entry names in page order.
///
/// # Errors
/// - `DataError::Http` / `DataError::Fetch`: the page could not be fetched.
/// - `DataError::Parse`: the body is not markup.
pub fn list_entries<F: HttpFetch + ?Sized>(fetch: &F, page_url: &str) -> Result<Vec<String>, DataError> {
    let html = fetch.get_text(page_url, &[])?;
    parse_listing(&html)
}

/// Extracts entry names from a listing page body.
pub fn parse_listing(html: &str) -> Result<Vec<String>, DataError> {
    if !html.contains('<') {
        return Err(DataError::Parse("listing page contains no markup".to_string()));
    }

    let document = Html::parse_document(html);
    let anchors = Selector::parse("a").expect("anchor selector should be valid");

    let entries = document
        .select(&anchors)
        .filter(|a| a.value().attr("href").is_some_and(is_listing_link))
        .map(|a| a.text().collect::<String>())
        .filter(|text| ENTRY_TEXT.is_match(text))
        .map(|text| text.trim_matches('/').to_string())
        .collect();

    Ok(entries)
}

fn is_listing_link(href: &str) -> bool {
    href.starts_with("catalog.html") || href.ends_with("catalog.html")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
