//! Parser trait abstraction
//!
//! Each log type has a parser implementing the [`LogParser`] trait, so the
//! aggregator can classify a document once and route it to the right parser.
//!
//! ## Design Principles
//!
//! 1. **Best effort**: Missing counts default to zero, missing scores stay undefined
//! 2. **Resilience**: Per-field problems are recorded as warnings, not errors
//! 3. **Strict identity**: A record without `userid`/`condition` is rejected

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::types::{LogType, ParsedLog};
use roxmltree::{Document, Node};
use std::path::Path;

/// Marker element of an actions log.
pub const ACTIONS_MARKER: &str = "WindowOpen";
/// Marker element (and container) of an evaluations log.
pub const EVALUATIONS_MARKER: &str = "Evaluations";

/// Context passed to a parser with file metadata and run parameters.
pub struct ParseContext<'a> {
    /// Path to the source file
    pub path: &'a Path,
    /// Bucketing and baseline parameters of this run
    pub config: &'a AnalysisConfig,
}

/// Trait implemented by the parser of each log type.
///
/// ## Error Handling
///
/// - Missing or unreadable fields should be recorded in the record's
///   `warnings` and left undefined, not returned as errors
/// - Only missing identity attributes ([`Error::MalformedLog`]) and missing
///   containers ([`Error::MissingSection`]) should return `Err`
pub trait LogParser: Send + Sync {
    /// Which log type this parser handles
    fn log_type(&self) -> LogType;

    /// Parse a classified document into a record.
    fn parse(&self, doc: &Document, ctx: &ParseContext) -> Result<ParsedLog>;
}

/// Classify a document by its marker elements.
///
/// The actions marker is checked first and wins if a (malformed) document
/// carries both.
pub fn classify(doc: &Document) -> LogType {
    let root = doc.root_element();
    if child(root, ACTIONS_MARKER).is_some() {
        LogType::Actions
    } else if child(root, EVALUATIONS_MARKER).is_some() {
        LogType::Evaluations
    } else {
        LogType::Unknown
    }
}

// ============================================
// Helper functions
// ============================================

/// First direct child element with the given tag name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.has_tag_name(name))
}

/// Direct child elements with the given tag name, in document order.
pub(crate) fn children<'a, 'input: 'a, 'n>(
    node: Node<'a, 'input>,
    name: &'n str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'n
where
    'a: 'n,
{
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// Descendant elements (excluding `node` itself) with the given tag name.
pub(crate) fn descendants<'a, 'input: 'a, 'n>(
    node: Node<'a, 'input>,
    name: &'n str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'n
where
    'a: 'n,
{
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// Participant ID and condition from the log root.
pub(crate) fn identity(doc: &Document) -> Result<(String, String)> {
    let root = doc.root_element();
    let user_id = root
        .attribute("userid")
        .or_else(|| root.attribute("userId"))
        .ok_or_else(|| Error::MalformedLog {
            attribute: "userid".to_string(),
        })?;
    let condition = root
        .attribute("condition")
        .ok_or_else(|| Error::MalformedLog {
            attribute: "condition".to_string(),
        })?;
    Ok((user_id.to_string(), condition.to_string()))
}

/// Read the `F1Weighted` score of an evaluation element.
///
/// `NaN` is a valid score; a missing or unparseable value is an
/// [`Error::UndefinedMetric`].
pub(crate) fn f1_weighted(node: Node) -> Result<f64> {
    let text = child(node, "F1Weighted")
        .and_then(|n| n.text())
        .ok_or_else(|| Error::undefined("F1Weighted", "element absent"))?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| Error::undefined("F1Weighted", format!("'{}': {}", text.trim(), e)))
}
