//! Main content boundary resolution
//!
//! Trims the node tree to the oracle's budget, asks the oracle for the path of
//! the primary content and cleans up whatever it answered.

use tracing::{debug, warn};

use crate::document::{BoundaryResult, NodeRecord};
use crate::error::{Error, Result};
use crate::oracle::SelectorOracle;
use crate::trimmer::TokenBudgetTrimmer;

pub struct ContentBoundaryResolver<O> {
    trimmer: TokenBudgetTrimmer,
    oracle: O,
}

impl<O: SelectorOracle> ContentBoundaryResolver<O> {
    pub fn new(trimmer: TokenBudgetTrimmer, oracle: O) -> Self {
        Self { trimmer, oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Resolve the main content path for a node record sequence.
    ///
    /// `EmptySequence` from trimming is returned as is; oracle errors and
    /// blank answers become `BoundaryResolutionFailed`.
    pub fn resolve(&self, records: &[NodeRecord]) -> Result<BoundaryResult> {
        let trimmed = self.trimmer.trim(records)?;
        debug!(
            records = trimmed.records.len(),
            size = trimmed.size,
            budget = self.trimmer.max_size(),
            "sending node tree to oracle"
        );

        let answer = self
            .oracle
            .select(&trimmed.records)
            .map_err(|e| Error::BoundaryResolutionFailed(e.to_string()))?;

        match clean_oracle_answer(&answer) {
            Some(path) => {
                debug!(path = %path, "resolved main content path");
                Ok(BoundaryResult { path })
            }
            None => {
                warn!(answer = %answer, "oracle returned no usable path");
                Err(Error::BoundaryResolutionFailed(
                    "oracle returned an empty answer".to_string(),
                ))
            }
        }
    }
}

/// Strip code fences, quoting and surrounding whitespace from a raw answer.
///
/// Returns the first non-empty line left over, or `None` if nothing is.
pub fn clean_oracle_answer(raw: &str) -> Option<String> {
    let mut lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("```") {
            match rest.find("```") {
                // fenced on a single line: everything inside is the answer
                Some(end) => lines.push(rest[..end].trim()),
                // an opening fence may carry a language tag, e.g. ```xpath
                None => {
                    let rest = rest.trim();
                    if !is_fence_tag(rest) {
                        lines.push(rest);
                    }
                }
            }
            continue;
        }
        lines.push(trimmed);
    }

    lines
        .into_iter()
        .map(|line| line.trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c.is_whitespace()))
        .find(|line| !line.is_empty())
        .map(String::from)
}

/// A fence info string: a bare word such as `xpath`, `css` or `text`
fn is_fence_tag(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}
