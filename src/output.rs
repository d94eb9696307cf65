//! Artifact files for successful pages
//!
//! Each page gets `<stem>.md` with its main content and `<stem>_links.json`
//! with the link list. The stem is derived from the URL alone, so reruns
//! overwrite the same files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::document::PageResult;

/// File stem for a URL: every character other than ASCII alphanumerics, `.`
/// and `-` becomes `_`
pub fn artifact_stem(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Paths written for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub markdown: PathBuf,
    pub links: PathBuf,
}

/// Write the artifacts of a successful page into `dir`.
///
/// Failures are logged and produce no files (`Ok(None)`).
pub fn write_artifacts(dir: &Path, result: &PageResult) -> io::Result<Option<Artifacts>> {
    let (url, markdown, links) = match result {
        PageResult::Success {
            url,
            main_content_markdown,
            links,
            ..
        } => (url, main_content_markdown, links),
        PageResult::Failure { url, error } => {
            error!(url = %url, error = %error, "failed to process page");
            return Ok(None);
        }
    };

    fs::create_dir_all(dir)?;
    let stem = artifact_stem(url);
    let artifacts = Artifacts {
        markdown: dir.join(format!("{}.md", stem)),
        links: dir.join(format!("{}_links.json", stem)),
    };

    fs::write(&artifacts.markdown, markdown)?;
    let json = serde_json::to_string_pretty(links).map_err(io::Error::other)?;
    fs::write(&artifacts.links, json)?;

    debug!(url = %url, path = %artifacts.markdown.display(), "wrote artifacts");
    Ok(Some(artifacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_stem() {
        assert_eq!(artifact_stem("https://ex.com/a/b"), "https___ex.com_a_b");
        assert_eq!(
            artifact_stem("https://www.semrush.com/blog/seo-tips/?q=1"),
            "https___www.semrush.com_blog_seo-tips__q_1"
        );
        assert_eq!(artifact_stem("https://ex.com/é"), "https___ex.com__");
    }

    #[test]
    fn test_write_success() {
        let dir = TempDir::new().unwrap();
        let result = PageResult::Success {
            url: "https://ex.com/x".to_string(),
            main_content_html: "<p>Hi</p>".to_string(),
            main_content_markdown: "Hi\n".to_string(),
            links: vec!["https://ex.com/a".to_string(), "https://ex.com/b".to_string()],
        };

        let artifacts = write_artifacts(dir.path(), &result).unwrap().unwrap();
        assert_eq!(artifacts.markdown, dir.path().join("https___ex.com_x.md"));
        assert_eq!(artifacts.links, dir.path().join("https___ex.com_x_links.json"));

        assert_eq!(fs::read_to_string(&artifacts.markdown).unwrap(), "Hi\n");
        let links: Vec<String> =
            serde_json::from_str(&fs::read_to_string(&artifacts.links).unwrap()).unwrap();
        assert_eq!(links, vec!["https://ex.com/a", "https://ex.com/b"]);
    }

    #[test]
    fn test_rerun_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut result = PageResult::Success {
            url: "https://ex.com/x".to_string(),
            main_content_html: String::new(),
            main_content_markdown: "first\n".to_string(),
            links: vec![],
        };
        write_artifacts(dir.path(), &result).unwrap();

        if let PageResult::Success {
            main_content_markdown,
            ..
        } = &mut result
        {
            *main_content_markdown = "second\n".to_string();
        }
        let artifacts = write_artifacts(dir.path(), &result).unwrap().unwrap();
        assert_eq!(fs::read_to_string(artifacts.markdown).unwrap(), "second\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let result = PageResult::failure("https://ex.com/x", "boom");

        assert_eq!(write_artifacts(dir.path(), &result).unwrap(), None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
