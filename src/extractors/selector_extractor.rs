//! Main content lookup by path expression
//!
//! Runs against the original, unsanitized tree: boilerplate removal may have
//! taken the target's siblings, but the target itself must still be there.

use scraper::Html;
use tracing::debug;

use super::path_expr::PathExpr;
use crate::error::{Error, Result};

/// Outer HTML of every element matching `path`, concatenated in document order
pub fn extract_by_path(document: &Html, path: &str) -> Result<String> {
    let expr = PathExpr::parse(path)?;
    let matches = expr.select(document);

    if matches.is_empty() {
        return Err(Error::ContentNotFound {
            path: path.to_string(),
        });
    }

    debug!(path, matches = matches.len(), "matched main content nodes");
    Ok(matches.iter().map(|el| el.html()).collect())
}

/// Parse `raw_markup` and extract the main content for `path`
pub fn extract_main_content_html(raw_markup: &str, path: &str) -> Result<String> {
    let document = Html::parse_document(raw_markup);
    extract_by_path(&document, path)
}
