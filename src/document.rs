//! Per-page document record and result shapes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One text-bearing node of the page with its ancestor tag chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: String,
    pub text: String,
}

impl NodeRecord {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Cleaned oracle answer: a path expression for the main content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryResult {
    pub path: String,
}

/// A non-fatal stage error kept on the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: &'static str,
    pub reason: String,
}

/// State threaded through the pipeline for a single page.
///
/// `raw_markup` is fixed at construction. Every other field is derived and
/// stays `None` when the stage producing it failed or was skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    pub url: String,
    raw_markup: String,
    pub cleaned_markup: Option<String>,
    pub full_markdown: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub node_tree: Option<Vec<NodeRecord>>,
    pub main_content_path: Option<String>,
    pub main_content_html: Option<String>,
    pub main_content_markdown: Option<String>,
    pub main_content_links: Option<Vec<String>>,
    pub failures: Vec<StageFailure>,
}

impl Document {
    pub fn new(url: impl Into<String>, raw_markup: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            raw_markup: raw_markup.into(),
            ..Default::default()
        }
    }

    pub fn raw_markup(&self) -> &str {
        &self.raw_markup
    }

    /// Markup later stages should read: cleaned if sanitizing succeeded, raw otherwise
    pub fn current_markup(&self) -> &str {
        self.cleaned_markup.as_deref().unwrap_or(&self.raw_markup)
    }
}

/// What the fetch collaborator hands over for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub raw_markup: String,
}

/// Per-document outcome. Serialized untagged so callers branch on `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageResult {
    Success {
        url: String,
        main_content_html: String,
        main_content_markdown: String,
        links: Vec<String>,
    },
    Failure {
        url: String,
        error: String,
    },
}

impl PageResult {
    pub fn failure(url: impl Into<String>, error: impl ToString) -> Self {
        PageResult::Failure {
            url: url.into(),
            error: error.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            PageResult::Success { url, .. } | PageResult::Failure { url, .. } => url,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PageResult::Failure { error, .. } => Some(error),
            PageResult::Success { .. } => None,
        }
    }
}
