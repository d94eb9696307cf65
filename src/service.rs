//! Per-page main content extraction
//!
//! `MainContentExtractor` is the document boundary: it validates the fetched
//! page, runs the pipeline, resolves and extracts the main content, and turns
//! any fatal error into a `PageResult::Failure`.

use scraper::Html;
use tracing::{info, warn};
use url::Url;

use crate::boundary::ContentBoundaryResolver;
use crate::config::{ExtractorConfig, StageContext};
use crate::document::{Document, FetchedPage, PageResult};
use crate::error::{Error, Result};
use crate::extractors::{extract_by_path, extract_links, html_to_markdown};
use crate::oracle::SelectorOracle;
use crate::pipeline::TransformationPipeline;
use crate::trimmer::TokenBudgetTrimmer;

pub struct MainContentExtractor<O> {
    config: ExtractorConfig,
    pipeline: TransformationPipeline,
    resolver: ContentBoundaryResolver<O>,
}

impl<O: SelectorOracle> MainContentExtractor<O> {
    pub fn new(config: ExtractorConfig, oracle: O) -> Self {
        let trimmer = TokenBudgetTrimmer::new(config.max_tokens).with_strategy(config.trim_strategy);
        Self::with_trimmer(config, trimmer, oracle)
    }

    /// Use a custom trimmer, e.g. one with a tokenizer-backed estimator
    pub fn with_trimmer(config: ExtractorConfig, trimmer: TokenBudgetTrimmer, oracle: O) -> Self {
        Self {
            config,
            pipeline: TransformationPipeline::new(),
            resolver: ContentBoundaryResolver::new(trimmer, oracle),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Process one fetched page. Never fails: errors become `PageResult::Failure`.
    pub fn process(&self, page: &FetchedPage) -> PageResult {
        if page.status_code != 200 {
            warn!(url = %page.url, status = page.status_code, "skipping page with bad status");
            return PageResult::failure(
                &page.url,
                Error::FetchRejected {
                    status: page.status_code,
                },
            );
        }

        match self.extract(&page.url, &page.raw_markup) {
            Ok(document) => {
                info!(
                    url = %page.url,
                    path = document.main_content_path.as_deref().unwrap_or_default(),
                    "extracted main content"
                );
                PageResult::Success {
                    url: page.url.clone(),
                    main_content_html: document.main_content_html.unwrap_or_default(),
                    main_content_markdown: document.main_content_markdown.unwrap_or_default(),
                    links: document.main_content_links.unwrap_or_default(),
                }
            }
            Err(e) => {
                warn!(url = %page.url, error = %e, "main content extraction failed");
                PageResult::failure(&page.url, e)
            }
        }
    }

    /// Run the full extraction for one page and return the populated document
    pub fn extract(&self, url: &str, raw_markup: &str) -> Result<Document> {
        if raw_markup.trim().is_empty() {
            return Err(Error::MissingInput);
        }

        let base_url = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let ctx = self.stage_context(base_url.clone());

        let mut document = self
            .pipeline
            .run(Document::new(url, raw_markup), &ctx)?;

        let records = document.node_tree.as_deref().unwrap_or_default();
        let boundary = self.resolver.resolve(records)?;

        // the original tree: sanitizing may have removed the target's ancestors
        let original = Html::parse_document(document.raw_markup());
        let main_html = extract_by_path(&original, &boundary.path)?;

        document.main_content_markdown = Some(html_to_markdown(&main_html, Some(&base_url)));
        document.main_content_links = Some(extract_links(&main_html, &base_url));
        document.main_content_html = Some(main_html);
        document.main_content_path = Some(boundary.path);

        Ok(document)
    }

    fn stage_context(&self, base_url: Url) -> StageContext {
        self.config.stage_context(Some(base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeRecord;
    use crate::oracle::OracleError;
    use std::sync::Mutex;

    const SCENARIO: &str = r#"<html><body><nav>Home</nav><article><p>Hello <a href="/x">link</a></p></article></body></html>"#;

    type Answer = std::result::Result<String, OracleError>;

    fn fixed(answer: &'static str) -> impl Fn(&[NodeRecord]) -> Answer + Send + Sync {
        move |_: &[NodeRecord]| Ok(answer.to_string())
    }

    fn page(raw: &str) -> FetchedPage {
        FetchedPage {
            url: "https://ex.com/".to_string(),
            status_code: 200,
            raw_markup: raw.to_string(),
        }
    }

    #[test]
    fn test_nav_article_scenario() {
        let seen: Mutex<Vec<NodeRecord>> = Mutex::new(Vec::new());
        let oracle = |records: &[NodeRecord]| -> Answer {
            if let Ok(mut seen) = seen.lock() {
                *seen = records.to_vec();
            }
            Ok("/html/body/article".to_string())
        };
        let config = ExtractorConfig {
            only_main_content: true,
            ..ExtractorConfig::default()
        };
        let extractor = MainContentExtractor::new(config, oracle);

        let document = extractor.extract("https://ex.com/", SCENARIO).unwrap();

        assert!(!document.cleaned_markup.as_deref().unwrap().contains("<nav"));
        let tree = document.node_tree.as_ref().unwrap();
        assert!(tree.iter().all(|record| !record.path.contains("nav")));
        assert_eq!(
            *tree,
            vec![
                NodeRecord::new("/html/body/article/p", "Hello"),
                NodeRecord::new("/html/body/article/p/a", "link"),
            ]
        );
        assert_eq!(*seen.lock().unwrap(), *tree);

        let html = document.main_content_html.as_deref().unwrap();
        assert!(html.starts_with("<article>") && html.ends_with("</article>"));
        assert_eq!(html, r#"<article><p>Hello <a href="/x">link</a></p></article>"#);
        assert_eq!(
            document.main_content_links,
            Some(vec!["https://ex.com/x".to_string()])
        );
        assert!(document
            .main_content_markdown
            .as_deref()
            .unwrap()
            .contains("Hello [link](https://ex.com/x)"));
    }

    #[test]
    fn test_process_returns_success_payload() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("/html/body/article"));

        let result = extractor.process(&page(SCENARIO));
        assert_eq!(
            result,
            PageResult::Success {
                url: "https://ex.com/".to_string(),
                main_content_html: r#"<article><p>Hello <a href="/x">link</a></p></article>"#
                    .to_string(),
                main_content_markdown: "Hello [link](https://ex.com/x)\n".to_string(),
                links: vec!["https://ex.com/x".to_string()],
            }
        );
    }

    #[test]
    fn test_extract_populates_document() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("```\n/html/body/article\n```"));
        let document = extractor.extract("https://ex.com/", SCENARIO).unwrap();

        assert_eq!(document.main_content_path.as_deref(), Some("/html/body/article"));
        assert!(document.cleaned_markup.is_some());
        assert!(document.full_markdown.as_deref().unwrap().contains("Home"));
        assert!(document.failures.is_empty());
    }

    #[test]
    fn test_main_content_removed_by_sanitizer_is_still_found() {
        let raw = r#"<html><body><div class="sidebar"><p>Side</p></div><main><header><h1>Title</h1></header><p>Body</p></main></body></html>"#;
        let config = ExtractorConfig {
            only_main_content: true,
            ..ExtractorConfig::default()
        };
        let extractor = MainContentExtractor::new(config, fixed("/html/body/main"));

        let document = extractor.extract("https://ex.com/", raw).unwrap();
        assert!(document.main_content_html.unwrap().contains("<h1>Title</h1>"));
        assert!(!document.cleaned_markup.unwrap().contains("Side"));
    }

    #[test]
    fn test_empty_markup_is_missing_input() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("/html/body"));

        let result = extractor.process(&page(""));
        assert_eq!(result.url(), "https://ex.com/");
        assert_eq!(result.error(), Some(Error::MissingInput.to_string().as_str()));
    }

    #[test]
    fn test_empty_oracle_answer_fails() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("``` ```"));

        let err = extractor.extract("https://ex.com/", SCENARIO).unwrap_err();
        assert!(matches!(err, Error::BoundaryResolutionFailed(_)));

        let result = extractor.process(&page(SCENARIO));
        assert!(result.error().unwrap().contains("boundary resolution failed"));
        assert!(!matches!(result, PageResult::Success { .. }));
    }

    #[test]
    fn test_unmatched_path_is_content_not_found() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("/html/body/main"));

        let err = extractor.extract("https://ex.com/", SCENARIO).unwrap_err();
        assert!(matches!(err, Error::ContentNotFound { ref path } if path == "/html/body/main"));
    }

    #[test]
    fn test_bad_status_is_rejected() {
        let oracle = |_: &[NodeRecord]| -> Answer { panic!("oracle must not be called") };
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), oracle);

        let mut fetched = page(SCENARIO);
        fetched.status_code = 404;
        let result = extractor.process(&fetched);
        assert_eq!(result.error(), Some("fetch rejected with status 404"));
    }

    #[test]
    fn test_invalid_url() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("/html/body"));
        let err = extractor.extract("not a url", SCENARIO).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_page_without_text_is_empty_sequence() {
        let extractor = MainContentExtractor::new(ExtractorConfig::default(), fixed("/html/body"));
        let err = extractor
            .extract("https://ex.com/", "<html><body><img src=a.png></body></html>")
            .unwrap_err();
        assert!(matches!(err, Error::EmptySequence));
    }
}
