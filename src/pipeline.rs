//! Document transformation pipeline
//!
//! Stages run in a fixed order: sanitize, markdown, metadata, node tree. Every
//! stage gets its own freshly parsed tree, so destructive stages cannot leak
//! mutations into later ones. A recoverable stage error is recorded on the
//! document and the pipeline moves on; a fatal one ends the run.

use scraper::Html;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::config::StageContext;
use crate::document::{Document, NodeRecord, StageFailure};
use crate::error::{Error, Result};
use crate::extractors::{extract_metadata, merge_metadata, render_markdown};
use crate::node_tree::serialize_tree;
use crate::sanitizer::sanitize;

pub const STAGE_SANITIZE: &str = "sanitize";
pub const STAGE_MARKDOWN: &str = "markdown";
pub const STAGE_METADATA: &str = "metadata";
pub const STAGE_NODE_TREE: &str = "node_tree";

/// Which markup a stage parses its tree from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// Always the untouched source
    Raw,
    /// Cleaned markup when sanitizing succeeded, raw otherwise
    Cleaned,
}

/// Result of one stage, applied to the document by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    CleanedMarkup(String),
    Markdown(String),
    Metadata(BTreeMap<String, String>),
    NodeTree(Vec<NodeRecord>),
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn input(&self) -> StageInput {
        StageInput::Cleaned
    }

    /// `tree` is parsed for this stage alone and may be mutated freely
    fn apply(&self, tree: Html, document: &Document, ctx: &StageContext) -> Result<StageOutput>;
}

pub struct SanitizeStage;

impl Stage for SanitizeStage {
    fn name(&self) -> &'static str {
        STAGE_SANITIZE
    }

    fn input(&self) -> StageInput {
        StageInput::Raw
    }

    fn apply(&self, mut tree: Html, _document: &Document, ctx: &StageContext) -> Result<StageOutput> {
        let cleaned = sanitize(
            &mut tree,
            &ctx.exclude_tags,
            ctx.only_main_content,
            &ctx.extra_removals,
        )?;
        Ok(StageOutput::CleanedMarkup(cleaned))
    }
}

pub struct MarkdownStage;

impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        STAGE_MARKDOWN
    }

    fn apply(&self, tree: Html, _document: &Document, ctx: &StageContext) -> Result<StageOutput> {
        Ok(StageOutput::Markdown(render_markdown(
            &tree,
            ctx.base_url.as_ref(),
        )))
    }
}

/// Reads the raw source: sanitizing drops `<head>` and everything in it
pub struct MetadataStage;

impl Stage for MetadataStage {
    fn name(&self) -> &'static str {
        STAGE_METADATA
    }

    fn input(&self) -> StageInput {
        StageInput::Raw
    }

    fn apply(&self, tree: Html, _document: &Document, _ctx: &StageContext) -> Result<StageOutput> {
        Ok(StageOutput::Metadata(extract_metadata(&tree)))
    }
}

pub struct NodeTreeStage;

impl Stage for NodeTreeStage {
    fn name(&self) -> &'static str {
        STAGE_NODE_TREE
    }

    fn apply(&self, tree: Html, _document: &Document, _ctx: &StageContext) -> Result<StageOutput> {
        Ok(StageOutput::NodeTree(serialize_tree(&tree)))
    }
}

pub struct TransformationPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for TransformationPipeline {
    fn default() -> Self {
        Self {
            stages: vec![
                Box::new(SanitizeStage),
                Box::new(MarkdownStage),
                Box::new(MetadataStage),
                Box::new(NodeTreeStage),
            ],
        }
    }
}

impl std::fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl TransformationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `document`.
    ///
    /// A missing source or a fatal stage error ends the run. Recoverable stage
    /// errors end up in `Document::failures` and leave that stage's output unset.
    pub fn run(&self, mut document: Document, ctx: &StageContext) -> Result<Document> {
        if document.raw_markup().trim().is_empty() {
            return Err(Error::MissingInput);
        }

        for stage in &self.stages {
            let name = stage.name();
            if ctx.skips_stage(name) {
                debug!(url = %document.url, stage = name, "stage skipped by feature flag");
                continue;
            }

            let markup = match stage.input() {
                StageInput::Raw => document.raw_markup(),
                StageInput::Cleaned => document.current_markup(),
            };
            let tree = Html::parse_document(markup);

            match stage.apply(tree, &document, ctx) {
                Ok(output) => {
                    debug!(url = %document.url, stage = name, "stage completed");
                    apply_output(&mut document, output);
                }
                Err(e) if e.is_fatal() => {
                    error!(url = %document.url, stage = name, error = %e, "stage aborted document");
                    return Err(e);
                }
                Err(e) => {
                    let failure = StageFailure {
                        stage: name,
                        reason: e.to_string(),
                    };
                    error!(
                        url = %document.url,
                        stage = name,
                        error = %Error::from(failure.clone()),
                        "stage failed"
                    );
                    document.failures.push(failure);
                }
            }
        }

        Ok(document)
    }
}

fn apply_output(document: &mut Document, output: StageOutput) {
    match output {
        StageOutput::CleanedMarkup(markup) => document.cleaned_markup = Some(markup),
        StageOutput::Markdown(markdown) => document.full_markdown = Some(markdown),
        StageOutput::Metadata(metadata) => merge_metadata(&mut document.metadata, metadata),
        StageOutput::NodeTree(records) => document.node_tree = Some(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const PAGE: &str = r#"<html lang="en"><head><title>Post</title><script>x()</script></head>
<body><nav>Home</nav><article><p>Hello <a href="/x">link</a></p></article></body></html>"#;

    fn context() -> StageContext {
        StageContext::default().with_base_url(Url::parse("https://ex.com/").unwrap())
    }

    struct FailingStage;

    impl Stage for FailingStage {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(&self, _tree: Html, _document: &Document, _ctx: &StageContext) -> Result<StageOutput> {
            Err(Error::Selector("broken".to_string()))
        }
    }

    struct AbortingStage;

    impl Stage for AbortingStage {
        fn name(&self) -> &'static str {
            "aborting"
        }

        fn apply(&self, _tree: Html, _document: &Document, _ctx: &StageContext) -> Result<StageOutput> {
            Err(Error::MissingInput)
        }
    }

    #[test]
    fn test_fatal_stage_error_is_returned() {
        let pipeline =
            TransformationPipeline::with_stages(vec![Box::new(AbortingStage), Box::new(NodeTreeStage)]);
        let result = pipeline.run(Document::new("https://ex.com/", PAGE), &context());
        assert!(matches!(result, Err(Error::MissingInput)));
    }

    #[test]
    fn test_default_stage_order() {
        assert_eq!(
            TransformationPipeline::new().stage_names(),
            vec!["sanitize", "markdown", "metadata", "node_tree"]
        );
    }

    #[test]
    fn test_run_fills_every_output() {
        let document = Document::new("https://ex.com/", PAGE);
        let document = TransformationPipeline::new().run(document, &context()).unwrap();

        let cleaned = document.cleaned_markup.as_deref().unwrap();
        assert!(!cleaned.contains("<script"));
        assert!(!cleaned.contains("<title"));

        let markdown = document.full_markdown.as_deref().unwrap();
        assert!(markdown.contains("Hello [link](https://ex.com/x)"));

        assert_eq!(document.metadata["title"], "Post");
        assert_eq!(document.metadata["language"], "en");

        let tree = document.node_tree.as_ref().unwrap();
        assert_eq!(
            tree,
            &vec![
                NodeRecord::new("/html/body/article/p", "Hello"),
                NodeRecord::new("/html/body/article/p/a", "link"),
            ]
        );
        assert!(document.failures.is_empty());
        assert_eq!(document.raw_markup(), PAGE);
    }

    #[test]
    fn test_missing_input_fails_fast() {
        for raw in ["", "  \n\t"] {
            let result = TransformationPipeline::new().run(Document::new("https://ex.com/", raw), &context());
            assert!(matches!(result, Err(Error::MissingInput)));
        }
    }

    #[test]
    fn test_stage_failure_is_isolated() {
        let mut ctx = context();
        ctx.exclude_tags = vec!["p[".to_string()];

        let document = TransformationPipeline::new()
            .run(Document::new("https://ex.com/", PAGE), &ctx)
            .unwrap();

        assert_eq!(document.cleaned_markup, None);
        assert_eq!(document.failures.len(), 1);
        assert_eq!(document.failures[0].stage, "sanitize");

        // later stages fell back to the raw source
        assert!(document.full_markdown.is_some());
        assert_eq!(document.metadata["title"], "Post");
        assert!(document.node_tree.is_some());
    }

    #[test]
    fn test_custom_failing_stage_does_not_stop_pipeline() {
        let pipeline =
            TransformationPipeline::with_stages(vec![Box::new(FailingStage), Box::new(NodeTreeStage)]);
        let document = pipeline
            .run(Document::new("https://ex.com/", PAGE), &context())
            .unwrap();

        assert_eq!(document.failures[0].stage, "failing");
        assert!(document.failures[0].reason.contains("broken"));
        assert!(document.node_tree.is_some());
    }

    #[test]
    fn test_skip_flag_disables_stage() {
        let mut ctx = context();
        ctx.feature_flags.insert("skip:markdown".to_string());

        let document = TransformationPipeline::new()
            .run(Document::new("https://ex.com/", PAGE), &ctx)
            .unwrap();

        assert_eq!(document.full_markdown, None);
        assert!(document.cleaned_markup.is_some());
        assert!(document.failures.is_empty());
    }

    #[test]
    fn test_existing_metadata_is_kept() {
        let mut document = Document::new("https://ex.com/", PAGE);
        document.metadata.insert("title".to_string(), "Caller".to_string());

        let document = TransformationPipeline::new().run(document, &context()).unwrap();
        assert_eq!(document.metadata["title"], "Caller");
        assert_eq!(document.metadata["language"], "en");
    }

    #[test]
    fn test_stages_do_not_see_each_others_mutations() {
        let mut ctx = context();
        ctx.only_main_content = true;

        let document = TransformationPipeline::new()
            .run(Document::new("https://ex.com/", PAGE), &ctx)
            .unwrap();

        // nav stripped from the cleaned output, raw source untouched
        assert!(!document.cleaned_markup.as_deref().unwrap().contains("Home"));
        assert!(document.raw_markup().contains("<nav>Home</nav>"));
    }
}
