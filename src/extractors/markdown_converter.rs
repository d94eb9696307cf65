//! Markdown rendering of parsed markup
//!
//! Conversion goes through htmd. Links and images get their own element
//! handlers so targets are resolved against the page URL while rendering.

use htmd::options::{BulletListMarker, CodeBlockStyle, HeadingStyle, Options};
use htmd::{Element, HtmlToMarkdown};
use scraper::Html;
use tracing::warn;
use url::Url;

use super::link_extractor::resolve_href;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "head", "title", "template", "iframe", "svg", "canvas",
    "button", "input", "select", "textarea", "option",
];

/// Render an HTML fragment (or whole document) as Markdown
pub fn html_to_markdown(html: &str, base: Option<&Url>) -> String {
    let converter = converter(base.cloned());
    let markdown = match converter.convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!(error = %e, "markdown conversion failed, falling back to plain text");
            Html::parse_fragment(html)
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ")
        }
    };

    let markdown = tidy(&markdown);
    if markdown.is_empty() {
        markdown
    } else {
        markdown + "\n"
    }
}

/// Render an already parsed tree as Markdown
pub fn render_markdown(document: &Html, base: Option<&Url>) -> String {
    html_to_markdown(&document.html(), base)
}

fn converter(base: Option<Url>) -> HtmlToMarkdown {
    let link_base = base.clone();
    HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .add_handler(vec!["a"], move |element: Element| {
            let text = element.content.trim();
            if text.is_empty() {
                return Some(String::new());
            }
            match attr(&element, "href").and_then(|href| resolve_link(href, link_base.as_ref())) {
                Some(target) => Some(format!("[{}]({})", text, target)),
                None => Some(text.to_string()),
            }
        })
        .add_handler(vec!["img"], move |element: Element| {
            let src = attr(&element, "src").map(str::trim).filter(|s| !s.is_empty())?;
            let src = match &base {
                Some(base) => base
                    .join(src)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| src.to_string()),
                None => src.to_string(),
            };
            let alt = attr(&element, "alt").unwrap_or("").trim();
            Some(format!("![{}]({})", alt, src))
        })
        .build()
}

fn attr<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element
        .attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| &*a.value)
}

/// Link target for Markdown output. Without a base, relative targets are kept.
fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    match base {
        Some(base) => resolve_href(href, base),
        None if href.is_empty()
            || href.starts_with('#')
            || href.to_ascii_lowercase().starts_with("javascript:") =>
        {
            None
        }
        None => Some(href.to_string()),
    }
}

/// Strip trailing spaces per line and fold runs of blank lines into one
fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim_matches('\n').to_string()
}
