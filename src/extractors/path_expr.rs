//! Path expressions over a parsed page
//!
//! Supports the XPath subset the node tree produces and chat models answer
//! with: `/html/body/main`, `//article`, `*`, positional `[2]` and `[last()]`
//! predicates and attribute tests `[@id]`, `[@class='post']`. Anything that
//! does not start with `/` or a bare tag step followed by `/` is parsed as a
//! CSS selector instead, so `a[href="/x"]` stays CSS.

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttr(String),
    AttrEquals(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` matches any element
    name: Option<String>,
    predicates: Vec<Predicate>,
}

/// A parsed path expression, ready to run against any number of trees
#[derive(Debug, Clone)]
pub struct PathExpr(Matcher);

#[derive(Debug, Clone)]
enum Matcher {
    Steps(Vec<Step>),
    Css(Selector),
}

impl PathExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let invalid = |reason: String| Error::InvalidPath {
            path: expr.to_string(),
            reason,
        };

        if expr.is_empty() {
            return Err(invalid("empty expression".to_string()));
        }

        if is_step_path(expr) {
            parse_steps(expr)
                .map(|steps| PathExpr(Matcher::Steps(steps)))
                .map_err(invalid)
        } else {
            Selector::parse(expr)
                .map(|selector| PathExpr(Matcher::Css(selector)))
                .map_err(|e| invalid(e.to_string()))
        }
    }

    /// Matching elements in document order, without duplicates
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match &self.0 {
            Matcher::Css(selector) => document.select(selector).collect(),
            Matcher::Steps(steps) => evaluate(steps, document),
        }
    }
}

/// Whether `expr` reads as a path: it starts with `/`, or its first `/`
/// outside brackets and quotes follows a bare tag step such as `html` or `div[2]`
fn is_step_path(expr: &str) -> bool {
    if expr.starts_with('/') {
        return true;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut slash = None;
    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                slash = Some(i);
                break;
            }
            _ => {}
        }
    }

    let Some(slash) = slash else {
        return false;
    };
    let head = &expr[..slash];
    let name = &head[..head.find('[').unwrap_or(head.len())];
    name == "*" || (!name.is_empty() && name.chars().all(is_name_char))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
}

fn parse_steps(expr: &str) -> std::result::Result<Vec<Step>, String> {
    let trimmed = expr.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("expression has no steps".to_string());
    }

    let mut steps = Vec::new();
    let mut rest = trimmed;
    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else if steps.is_empty() {
            // relative paths start at the document root as well
            Axis::Child
        } else {
            return Err(format!("unexpected input at `{}`", rest));
        };

        let name_end = rest.find(['/', '[']).unwrap_or(rest.len());
        let name = rest[..name_end].trim();
        rest = &rest[name_end..];

        if name.is_empty() {
            return Err("empty step".to_string());
        }
        if name != "*"
            && !name.chars().all(is_name_char)
        {
            return Err(format!("unsupported step `{}`", name));
        }

        let mut predicates = Vec::new();
        while let Some(r) = rest.strip_prefix('[') {
            let end = predicate_end(r).ok_or_else(|| "unclosed predicate".to_string())?;
            predicates.push(parse_predicate(&r[..end])?);
            rest = &r[end + 1..];
        }

        steps.push(Step {
            axis,
            name: (name != "*").then(|| name.to_ascii_lowercase()),
            predicates,
        });
    }

    Ok(steps)
}

/// Index of the `]` closing a predicate, ignoring brackets inside quotes
fn predicate_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(body: &str) -> std::result::Result<Predicate, String> {
    let body = body.trim();

    if body == "last()" {
        return Ok(Predicate::Last);
    }
    if let Ok(position) = body.parse::<usize>() {
        if position == 0 {
            return Err("positions start at 1".to_string());
        }
        return Ok(Predicate::Position(position));
    }
    if let Some(attr) = body.strip_prefix('@') {
        return match attr.split_once('=') {
            Some((name, value)) => {
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or_else(|| format!("attribute value must be quoted: {}", value))?;
                Ok(Predicate::AttrEquals(
                    name.trim().to_ascii_lowercase(),
                    unquoted.to_string(),
                ))
            }
            None => Ok(Predicate::HasAttr(attr.trim().to_ascii_lowercase())),
        };
    }

    Err(format!("unsupported predicate `[{}]`", body))
}

impl Step {
    fn select_children<'a>(&self, parent: NodeRef<'a, Node>) -> Vec<NodeRef<'a, Node>> {
        let mut candidates: Vec<NodeRef<'a, Node>> = parent
            .children()
            .filter(|child| match child.value() {
                Node::Element(el) => self
                    .name
                    .as_deref()
                    .map_or(true, |name| el.name().eq_ignore_ascii_case(name)),
                _ => false,
            })
            .collect();

        for predicate in &self.predicates {
            candidates = predicate.apply(candidates);
        }
        candidates
    }
}

impl Predicate {
    fn apply<'a>(&self, candidates: Vec<NodeRef<'a, Node>>) -> Vec<NodeRef<'a, Node>> {
        match self {
            Predicate::Position(n) => candidates.get(n - 1).copied().into_iter().collect(),
            Predicate::Last => candidates.last().copied().into_iter().collect(),
            Predicate::HasAttr(name) => candidates
                .into_iter()
                .filter(|n| attr(n, name).is_some())
                .collect(),
            Predicate::AttrEquals(name, value) => candidates
                .into_iter()
                .filter(|n| attr(n, name) == Some(value.as_str()))
                .collect(),
        }
    }
}

fn attr<'a>(node: &NodeRef<'a, Node>, name: &str) -> Option<&'a str> {
    match node.value() {
        Node::Element(el) => el.attr(name),
        _ => None,
    }
}

fn can_have_children(node: &NodeRef<'_, Node>) -> bool {
    matches!(
        node.value(),
        Node::Element(_) | Node::Document | Node::Fragment
    )
}

fn evaluate<'a>(steps: &[Step], document: &'a Html) -> Vec<ElementRef<'a>> {
    let root = document.tree.root();
    let mut context: Vec<NodeRef<'a, Node>> = vec![root];

    for step in steps {
        let mut next = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();

        for node in &context {
            let parents: Vec<NodeRef<'a, Node>> = match step.axis {
                Axis::Child => vec![*node],
                Axis::Descendant => node.descendants().filter(can_have_children).collect(),
            };
            for parent in parents {
                for matched in step.select_children(parent) {
                    if seen.insert(matched.id()) {
                        next.push(matched);
                    }
                }
            }
        }

        context = next;
        if context.is_empty() {
            break;
        }
    }

    let order: HashMap<NodeId, usize> = root
        .descendants()
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect();
    context.sort_by_key(|n| order.get(&n.id()).copied().unwrap_or(usize::MAX));

    context.into_iter().filter_map(ElementRef::wrap).collect()
}
