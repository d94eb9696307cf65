//! Link collection from a markup subtree

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

/// Resolve one `href` against the page URL.
///
/// Returns `None` for links that should not be reported: in-page anchors,
/// `javascript:` pseudo links, empty values and anything that fails to parse.
pub fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") {
        return None;
    }
    if lower.starts_with("mailto:") {
        return Some(href.to_string());
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }

    // root-relative, scheme-relative and plain relative paths
    match base.join(href) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(e) => {
            debug!(href, error = %e, "dropping unresolvable link");
            None
        }
    }
}

/// Collect the distinct links of every `a[href]` in `html`, sorted
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_fragment(html);
    extract_links_from(&document, base)
}

pub fn extract_links_from(document: &Html, base: &Url) -> Vec<String> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    let links: BTreeSet<String> = document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_href(href, base))
        .collect();

    links.into_iter().collect()
}
