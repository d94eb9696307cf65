//! Page metadata extraction
//!
//! Title, description, keywords, language and the Open Graph basics.

use scraper::{Html, Selector};
use std::collections::BTreeMap;

/// Open Graph properties copied under their bare key
const OPENGRAPH_KEYS: &[&str] = &["title", "description", "url", "image"];

/// Extract page metadata into a flat map. Missing fields produce no key.
pub fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    if let Some(title) = first_text(document, "title") {
        metadata.insert("title".to_string(), title);
    }

    for name in ["description", "keywords"] {
        let selector = format!(r#"meta[name="{}"]"#, name);
        if let Some(content) = first_attr(document, &selector, "content") {
            metadata.insert(name.to_string(), content);
        }
    }

    if let Some(lang) = document.root_element().value().attr("lang") {
        metadata.insert("language".to_string(), lang.to_string());
    }

    // Open Graph fills gaps, it never replaces the standard tags
    for key in OPENGRAPH_KEYS {
        let selector = format!(r#"meta[property="og:{}"]"#, key);
        if let Some(content) = first_attr(document, &selector, "content") {
            metadata.entry(key.to_string()).or_insert(content);
        }
    }

    metadata
}

/// Fold freshly extracted metadata into an existing map without overwriting it
pub fn merge_metadata(existing: &mut BTreeMap<String, String>, extracted: BTreeMap<String, String>) {
    for (key, value) in extracted {
        existing.entry(key).or_insert(value);
    }
}

fn first_text(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    let text = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn first_attr(document: &Html, selector_str: &str, attr_name: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr_name).map(String::from))
}
