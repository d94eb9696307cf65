//! Markup cleanup
//!
//! Removes script-like elements and caller-excluded tags from a parsed tree,
//! and optionally the boilerplate catalog. Removal detaches nodes from the
//! tree in place, so the same `Html` instance cannot be restored afterwards.

use ego_tree::NodeId;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Always removed, whatever the options
pub const UNSAFE_TAGS: &[&str] = &["script", "style", "noscript", "meta", "head"];

/// Clean `document` and return its serialized markup
pub fn sanitize(
    document: &mut Html,
    exclude_tags: &[String],
    only_main_content: bool,
    extra_removals: &[String],
) -> Result<String> {
    let mut removed = 0usize;

    for tag in UNSAFE_TAGS.iter().copied().chain(exclude_tags.iter().map(String::as_str)) {
        let selector =
            Selector::parse(tag).map_err(|e| Error::Selector(format!("`{}`: {}", tag, e)))?;
        removed += remove_matching(document, &selector);
    }

    if only_main_content {
        for removal in extra_removals {
            match Selector::parse(removal) {
                Ok(selector) => removed += remove_matching(document, &selector),
                Err(e) => warn!(selector = %removal, error = %e, "skipping invalid removal selector"),
            }
        }
    }

    debug!(removed, only_main_content, "sanitized markup");
    Ok(document.html())
}

/// Detach every element matching `selector`, returning how many were matched
fn remove_matching(document: &mut Html, selector: &Selector) -> usize {
    let ids: Vec<NodeId> = document.select(selector).map(|el| el.id()).collect();

    for id in &ids {
        if let Some(mut node) = document.tree.get_mut(*id) {
            node.detach();
        }
    }

    ids.len()
}
