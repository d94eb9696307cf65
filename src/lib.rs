//! Main content extraction for web pages
//!
//! Turns a fetched page into its primary content:
//! - Sanitizing, Markdown, metadata and node tree stages
//! - Size-budget trimming of the node tree
//! - Oracle-driven resolution of the main content path
//! - Path expression matching against the original markup
//! - Markdown and link outputs for the matched content

pub mod boundary;
pub mod config;
pub mod document;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod node_tree;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod sanitizer;
pub mod service;
pub mod trimmer;

pub use boundary::ContentBoundaryResolver;
pub use config::{ExtractorConfig, LlmConfig, StageContext};
pub use document::{Document, FetchedPage, NodeRecord, PageResult};
pub use error::{Error, Result};
pub use oracle::{ChatCompletionOracle, OracleError, SelectorOracle};
pub use pipeline::TransformationPipeline;
pub use service::MainContentExtractor;
pub use trimmer::{TokenBudgetTrimmer, TrimStrategy};
