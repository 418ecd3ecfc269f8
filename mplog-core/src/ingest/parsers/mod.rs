//! Log-type-specific parsers
//!
//! Each log type has a parser module that implements
//! the [`LogParser`](super::LogParser) trait.
//!
//! | Log type | Marker | Module |
//! |----------|--------|--------|
//! | Actions | `WindowOpen` | [`actions`] |
//! | Evaluations | `Evaluations` | [`evaluations`] |

pub mod actions;
pub mod evaluations;

pub use actions::{ActionsParser, SegmentLocation};
pub use evaluations::EvaluationsParser;

use super::LogParser;
use crate::types::LogType;
use std::path::Path;

/// Create all available parsers.
///
/// Use this to initialize a [`LogAggregator`](super::LogAggregator).
pub fn create_all_parsers() -> Vec<Box<dyn LogParser>> {
    vec![
        Box::new(ActionsParser::new()),
        Box::new(EvaluationsParser::new()),
    ]
}

/// Get a parser for a specific log type.
///
/// Returns `None` for [`LogType::Unknown`].
pub fn parser_for(log_type: LogType) -> Option<Box<dyn LogParser>> {
    match log_type {
        LogType::Actions => Some(Box::new(ActionsParser::new())),
        LogType::Evaluations => Some(Box::new(EvaluationsParser::new())),
        LogType::Unknown => None,
    }
}

/// Record a non-fatal parse problem and report it.
pub(crate) fn record_warning(warnings: &mut Vec<String>, path: &Path, message: impl Into<String>) {
    let message = message.into();
    tracing::warn!(path = %path.display(), "{}", message);
    warnings.push(format!("{}: {}", path.display(), message));
}
