//! Flat `{path, text}` view of a parsed page
//!
//! The walk is pre-order, so records come out in reading order. Elements in
//! `NON_ESSENTIAL_TAGS` are dropped together with their whole subtree.

use ego_tree::iter::Edge;
use scraper::{Html, Node};

use crate::document::NodeRecord;
use crate::error::Result;

/// Tags that never carry main content
pub const NON_ESSENTIAL_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "iframe", "svg", "noscript", "figure", "picture", "image",
    "img", "source", "button", "input", "nav", "footer", "header", "aside",
];

fn is_non_essential(tag: &str) -> bool {
    NON_ESSENTIAL_TAGS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(tag))
}

/// Serialize a parsed document into ordered node records
pub fn serialize_tree(document: &Html) -> Vec<NodeRecord> {
    let mut records = Vec::new();
    let mut path = String::new();
    // path length to restore when the matching element closes
    let mut saved_lengths: Vec<usize> = Vec::new();
    let mut skip_depth = 0usize;

    for edge in document.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(element) => {
                    if skip_depth > 0 || is_non_essential(element.name()) {
                        skip_depth += 1;
                        continue;
                    }
                    saved_lengths.push(path.len());
                    path.push('/');
                    path.push_str(&element.name().to_ascii_lowercase());
                }
                Node::Text(text) if skip_depth == 0 => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        records.push(NodeRecord::new(path.as_str(), trimmed));
                    }
                }
                // comments, doctype and processing instructions carry nothing
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(_) = node.value() {
                    if skip_depth > 0 {
                        skip_depth -= 1;
                    } else if let Some(len) = saved_lengths.pop() {
                        path.truncate(len);
                    }
                }
            }
        }
    }

    records
}

/// JSON payload of a record sequence, as sent to the oracle and measured by the trimmer
pub fn to_payload(records: &[NodeRecord]) -> Result<String> {
    Ok(serde_json::to_string(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_ancestor_chain() {
        let html = r#"<html><body><div><p>Hello <b>bold</b> world</p></div></body></html>"#;
        let records = serialize_tree(&Html::parse_document(html));

        assert_eq!(
            records,
            vec![
                NodeRecord::new("/html/body/div/p", "Hello"),
                NodeRecord::new("/html/body/div/p/b", "bold"),
                NodeRecord::new("/html/body/div/p", "world"),
            ]
        );
    }

    #[test]
    fn test_skips_non_essential_subtrees() {
        let html = r#"
        <html>
        <head><title>Page</title><script>var x = 1;</script></head>
        <body>
            <header><h1>Site</h1></header>
            <nav><a href="/">Home</a></nav>
            <article><p>Body text</p><figure><figcaption>Caption</figcaption></figure></article>
            <aside>Related</aside>
            <footer>Copyright</footer>
        </body>
        </html>"#;
        let records = serialize_tree(&Html::parse_document(html));
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();

        assert_eq!(texts, vec!["Page", "Body text"]);
        assert_eq!(records[0].path, "/html/head/title");
        assert_eq!(records[1].path, "/html/body/article/p");
    }

    #[test]
    fn test_comments_and_whitespace_produce_nothing() {
        let html = "<html><body>\n  <!-- hidden comment -->\n  <p>  </p><p> kept </p></body></html>";
        let records = serialize_tree(&Html::parse_document(html));
        assert_eq!(records, vec![NodeRecord::new("/html/body/p", "kept")]);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let html = r#"<html><body><main><h1>T</h1><ul><li>a</li><li>b</li></ul></main></body></html>"#;
        let document = Html::parse_document(html);
        let first = serialize_tree(&document);
        let second = serialize_tree(&document);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_sibling_after_skipped_subtree_keeps_path() {
        let html = r#"<html><body><div><nav><span>x</span></nav><p>after</p></div></body></html>"#;
        let records = serialize_tree(&Html::parse_document(html));
        assert_eq!(records, vec![NodeRecord::new("/html/body/div/p", "after")]);
    }

    #[test]
    fn test_payload_is_json_array() {
        let records = vec![NodeRecord::new("/html/body/p", "Hi \"there\"")];
        let payload = to_payload(&records).unwrap();
        assert_eq!(payload, r#"[{"path":"/html/body/p","text":"Hi \"there\""}]"#);
    }
}
