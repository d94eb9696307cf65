//! Size-budget trimming of node record sequences
//!
//! The oracle only accepts payloads up to a fixed size. Records are removed
//! until the serialized sequence fits. Survivors always keep document order.

use std::str::FromStr;

use crate::document::NodeRecord;
use crate::error::{Error, Result};
use crate::node_tree::to_payload;

pub const DEFAULT_MAX_TOKENS: usize = 60_000;

/// Measures a serialized payload in abstract size units.
///
/// `TokenBudgetTrimmer::assume_monotone` additionally requires that a longer
/// payload never measures smaller.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, payload: &str) -> usize;
}

impl<F> SizeEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, payload: &str) -> usize {
        self(payload)
    }
}

/// Roughly four characters per token for English text and JSON
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    pub chars_per_unit: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self { chars_per_unit: 4 }
    }
}

impl SizeEstimator for CharRatioEstimator {
    fn estimate(&self, payload: &str) -> usize {
        let per_unit = self.chars_per_unit.max(1);
        payload.chars().count().div_ceil(per_unit)
    }
}

/// Which records are sacrificed first when the payload is over budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimStrategy {
    /// Drop from the end of the document (late content is lost first)
    #[default]
    Tail,
    /// Drop the records with the shortest text first
    ShortestText,
}

impl FromStr for TrimStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tail" => Ok(TrimStrategy::Tail),
            "shortest-text" | "shortest_text" | "shortest" => Ok(TrimStrategy::ShortestText),
            other => Err(format!("unknown trim strategy: {}", other)),
        }
    }
}

/// A record sequence that fits the budget, plus its payload
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedTree {
    pub records: Vec<NodeRecord>,
    pub payload: String,
    pub size: usize,
}

pub struct TokenBudgetTrimmer {
    max_size: usize,
    strategy: TrimStrategy,
    estimator: Box<dyn SizeEstimator>,
    bisect: bool,
}

impl Default for TokenBudgetTrimmer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl std::fmt::Debug for TokenBudgetTrimmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgetTrimmer")
            .field("max_size", &self.max_size)
            .field("strategy", &self.strategy)
            .field("bisect", &self.bisect)
            .finish()
    }
}

impl TokenBudgetTrimmer {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            strategy: TrimStrategy::Tail,
            estimator: Box::new(CharRatioEstimator::default()),
            bisect: false,
        }
    }

    pub fn with_strategy(mut self, strategy: TrimStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_estimator(mut self, estimator: impl SizeEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Binary-search the number of removed records instead of dropping them
    /// one at a time. Only correct when the estimator is monotone in payload
    /// length; otherwise a smaller fitting sequence than the one-by-one loop
    /// would find may be returned.
    pub fn assume_monotone(mut self) -> Self {
        self.bisect = true;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Shrink `records` until the serialized payload fits the budget
    pub fn trim(&self, records: &[NodeRecord]) -> Result<TrimmedTree> {
        if records.is_empty() {
            return Err(Error::EmptySequence);
        }

        // order in which records are given up
        let removal_order: Vec<usize> = match self.strategy {
            TrimStrategy::Tail => (0..records.len()).rev().collect(),
            TrimStrategy::ShortestText => {
                let mut order: Vec<usize> = (0..records.len()).collect();
                // ties go to the later record, matching the tail policy
                order.sort_by(|&a, &b| {
                    records[a]
                        .text
                        .chars()
                        .count()
                        .cmp(&records[b].text.chars().count())
                        .then(b.cmp(&a))
                });
                order
            }
        };

        if let Some(fit) = self.try_fit(records, &removal_order, 0)? {
            return Ok(fit);
        }

        let fit = if self.bisect {
            self.bisect_fit(records, &removal_order)?
        } else {
            // drop one record, measure again
            let mut found = None;
            for removed in 1..records.len() {
                if let Some(fit) = self.try_fit(records, &removal_order, removed)? {
                    found = Some(fit);
                    break;
                }
            }
            found
        };

        match fit {
            Some(fit) => {
                tracing::debug!(
                    kept = fit.records.len(),
                    dropped = records.len() - fit.records.len(),
                    size = fit.size,
                    "trimmed node tree to budget"
                );
                Ok(fit)
            }
            None => Err(Error::EmptySequence),
        }
    }

    /// Smallest number of removals that fits, assuming fitting is monotone in it
    fn bisect_fit(
        &self,
        records: &[NodeRecord],
        removal_order: &[usize],
    ) -> Result<Option<TrimmedTree>> {
        let mut lo = 0usize; // known not to fit
        let mut hi = records.len(); // removing everything is never a result
        let mut best = None;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            match self.try_fit(records, removal_order, mid)? {
                Some(fit) => {
                    best = Some(fit);
                    hi = mid;
                }
                None => lo = mid,
            }
        }
        Ok(best)
    }

    fn try_fit(
        &self,
        records: &[NodeRecord],
        removal_order: &[usize],
        removed: usize,
    ) -> Result<Option<TrimmedTree>> {
        let kept = if removed == 0 {
            records.to_vec()
        } else {
            let mut keep = vec![true; records.len()];
            for &idx in &removal_order[..removed] {
                keep[idx] = false;
            }
            records
                .iter()
                .zip(keep)
                .filter(|(_, k)| *k)
                .map(|(r, _)| r.clone())
                .collect()
        };

        let payload = to_payload(&kept)?;
        let size = self.estimator.estimate(&payload);
        if size <= self.max_size {
            Ok(Some(TrimmedTree {
                records: kept,
                payload,
                size,
            }))
        } else {
            Ok(None)
        }
    }
}
