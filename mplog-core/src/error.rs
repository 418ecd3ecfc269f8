//! Error types for mplog-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the mplog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The log file is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Log directory could not be walked
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A required attribute is missing from the log root
    #[error("malformed log: missing required attribute '{attribute}'")]
    MalformedLog { attribute: String },

    /// An expected container element is absent
    #[error("missing section: <{section}> not found")]
    MissingSection { section: String },

    /// A derived score could not be computed
    #[error("undefined metric {metric}: {reason}")]
    UndefinedMetric { metric: String, reason: String },

    /// Input file is not an XML log
    #[error("unrecognized file: {0}")]
    UnrecognizedFile(PathBuf),

    /// XML document carries neither log marker
    #[error("unknown log type: {0}")]
    UnknownLogType(PathBuf),

    /// Questionnaire has no row for a participant
    #[error("no questionnaire row for participant '{0}'")]
    UnmatchedKey(String),

    /// Questionnaire row width differs from its header
    #[error("questionnaire row for participant '{participant}' has {found} columns, header has {expected}")]
    RaggedRow {
        participant: String,
        expected: usize,
        found: usize,
    },

    /// Table row could not be assembled
    #[error("incomplete row for participant '{user_id}': missing {field}")]
    IncompleteRow { user_id: String, field: String },
}

impl Error {
    pub(crate) fn undefined(metric: &str, reason: impl Into<String>) -> Self {
        Error::UndefinedMetric {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for mplog-core
pub type Result<T> = std::result::Result<T, Error>;
