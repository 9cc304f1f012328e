//! Embedded JSON extraction from token pages
//!
//! Token homepages built with Next.js ship their data in a
//! `<script id="__NEXT_DATA__" type="application/json">` element.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Element id of the embedded page data
pub const NEXT_DATA_ID: &str = "__NEXT_DATA__";

/// Parse the JSON embedded in a `<script id="...">` element
pub fn extract_script_json(html: &str, id: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!("script#{}", id)).ok()?;

    let script = document.select(&selector).next()?;
    let text = script.text().collect::<String>();
    match serde_json::from_str(text.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Embedded {} is not valid JSON: {}", id, e);
            None
        }
    }
}

/// Parse the page's `__NEXT_DATA__` payload
pub fn extract_next_data(html: &str) -> Option<Value> {
    extract_script_json(html, NEXT_DATA_ID)
}

/// Page title, if present
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}
