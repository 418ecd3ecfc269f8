//! Ingestion layer for parsing experiment log files
//!
//! This module orchestrates the parsing of raw XML logs (Layer 0) into
//! typed records (Layer 1) and groups them per participant for the table
//! (Layer 2).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │   Log files     │ ──► │  LogAggregator   │ ──► │ AggregatedTable │
//! │  (logs/*.xml)   │     │  (per user ID)   │     │  (one row/user) │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │  classify + LogParser│
//!                    │  ├─ ActionsParser    │
//!                    │  └─ EvaluationsParser│
//!                    └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mplog_core::{Config, LogAggregator};
//!
//! let config = Config::load()?;
//! let aggregator = LogAggregator::new(config.analysis);
//!
//! let report = aggregator.aggregate_dir("logs/")?;
//! println!("{} rows from {} files", report.table.rows.len(), report.files_processed);
//! ```

mod parser;
pub mod parsers;

pub use parser::{classify, LogParser, ParseContext, ACTIONS_MARKER, EVALUATIONS_MARKER};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::table::AggregatedTable;
use crate::types::{ActionsRecord, EvaluationsRecord, LogType, ParsedLog};
use roxmltree::Document;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Records of one participant, at most one per log type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserLogs {
    pub actions: Option<ActionsRecord>,
    pub evaluations: Option<EvaluationsRecord>,
}

/// Result of an aggregation run.
#[derive(Debug, Default)]
pub struct AggregateReport {
    /// One row per participant with an actions record, sorted by ID
    pub table: AggregatedTable,
    /// Number of log files parsed into a record
    pub files_processed: usize,
    /// Files that are not XML logs (file path → reason)
    pub skipped: Vec<(PathBuf, String)>,
    /// Files that failed to parse (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
    /// Rows dropped while assembling the table (user ID → error message)
    pub excluded_rows: Vec<(String, String)>,
    /// Participants with an evaluations record but no actions record
    pub evaluations_only: Vec<String>,
    /// Non-fatal problems from parsing
    pub warnings: Vec<String>,
}

/// Parses a set of log files and assembles the per-participant table.
///
/// The aggregator is responsible for:
/// - Discovering log files under a directory
/// - Classifying each document and routing it to its parser
/// - Grouping records by participant and log type
/// - Building the [`AggregatedTable`]
pub struct LogAggregator {
    config: AnalysisConfig,
    parsers: Vec<Box<dyn LogParser>>,
}

impl LogAggregator {
    /// Create a new aggregator with the default parsers.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            parsers: parsers::create_all_parsers(),
        }
    }

    /// Create an aggregator with custom parsers.
    pub fn with_parsers(config: AnalysisConfig, parsers: Vec<Box<dyn LogParser>>) -> Self {
        Self { config, parsers }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Discover all regular files under `dir`, recursively, in sorted order.
    ///
    /// Fails if `dir` is not a readable directory.
    pub fn discover_files(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let metadata = std::fs::metadata(dir)?;
        if !metadata.is_dir() {
            return Err(Error::Discovery(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        // The directory itself may contain glob metacharacters
        let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy()))
            .join("**")
            .join("*");
        let pattern_str = pattern.to_string_lossy();
        let entries = glob::glob(&pattern_str)
            .map_err(|e| Error::Discovery(format!("Invalid glob pattern: {}", e)))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable path during discovery");
                }
            }
        }
        files.sort();

        tracing::info!(
            dir = %dir.display(),
            count = files.len(),
            "Discovered files"
        );
        Ok(files)
    }

    /// Parse a single log file into a record.
    ///
    /// Non-XML files fail with [`Error::UnrecognizedFile`] and documents
    /// without a marker with [`Error::UnknownLogType`].
    pub fn parse_file(&self, path: &Path) -> Result<ParsedLog> {
        if !is_xml_file(path) {
            return Err(Error::UnrecognizedFile(path.to_path_buf()));
        }

        tracing::info!(path = %path.display(), "Parsing log");
        let content = std::fs::read_to_string(path)?;
        // The study tool writes a UTF-8 byte order mark
        let doc = Document::parse(content.trim_start_matches('\u{feff}'))?;

        let log_type = classify(&doc);
        let parser = self
            .parser_for_type(log_type)
            .ok_or_else(|| Error::UnknownLogType(path.to_path_buf()))?;

        let ctx = ParseContext {
            path,
            config: &self.config,
        };
        parser.parse(&doc, &ctx)
    }

    /// Parse and group files by participant.
    ///
    /// A later file of the same participant and log type replaces an earlier
    /// one; `files` order decides.
    pub fn group_files(&self, files: &[PathBuf]) -> (BTreeMap<String, UserLogs>, AggregateReport) {
        self.group_files_with_progress(files, |_, _, _| {})
    }

    /// Parse and group files with a progress callback.
    ///
    /// The callback receives `(current_file_index, total_files, file_path)`
    /// before each file is processed.
    pub fn group_files_with_progress<F>(
        &self,
        files: &[PathBuf],
        mut on_progress: F,
    ) -> (BTreeMap<String, UserLogs>, AggregateReport)
    where
        F: FnMut(usize, usize, &Path),
    {
        let mut groups: BTreeMap<String, UserLogs> = BTreeMap::new();
        let mut report = AggregateReport::default();

        for (i, path) in files.iter().enumerate() {
            on_progress(i, files.len(), path);

            let parsed = match self.parse_file(path) {
                Ok(parsed) => parsed,
                Err(Error::UnrecognizedFile(_)) => {
                    tracing::info!(path = %path.display(), "Ignoring non-XML file");
                    report
                        .skipped
                        .push((path.clone(), "not an XML file".to_string()));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse log");
                    report.errors.push((path.clone(), e.to_string()));
                    continue;
                }
            };

            report.files_processed += 1;
            report.warnings.extend(parsed.warnings().iter().cloned());

            let user_id = parsed.user_id().to_string();
            let log_type = parsed.log_type();
            let entry = groups.entry(user_id.clone()).or_default();
            let replaced = match parsed {
                ParsedLog::Actions(record) => entry.actions.replace(record).is_some(),
                ParsedLog::Evaluations(record) => entry.evaluations.replace(record).is_some(),
            };
            if replaced {
                tracing::warn!(
                    user_id = %user_id,
                    log_type = %log_type,
                    path = %path.display(),
                    "Replacing earlier record of the same participant"
                );
            }
        }

        (groups, report)
    }

    /// Aggregate the given files into a table.
    pub fn aggregate(&self, files: &[PathBuf]) -> AggregateReport {
        let (groups, mut report) = self.group_files(files);
        self.finish(&groups, &mut report);
        report
    }

    /// Discover and aggregate all files under `dir`.
    ///
    /// Fails with [`Error::Config`] if the analysis parameters are invalid.
    pub fn aggregate_dir(&self, dir: impl AsRef<Path>) -> Result<AggregateReport> {
        self.config.validate()?;
        let files = self.discover_files(dir)?;
        Ok(self.aggregate(&files))
    }

    /// Build the table from grouped records and fill in the row diagnostics.
    pub fn finish(&self, groups: &BTreeMap<String, UserLogs>, report: &mut AggregateReport) {
        let (table, excluded) = AggregatedTable::build(groups, &self.config);

        for (user_id, e) in excluded {
            tracing::warn!(user_id = %user_id, error = %e, "Excluding row");
            report.excluded_rows.push((user_id, e.to_string()));
        }

        report.evaluations_only = groups
            .iter()
            .filter(|(_, logs)| logs.actions.is_none() && logs.evaluations.is_some())
            .map(|(user_id, _)| user_id.clone())
            .collect();
        if !report.evaluations_only.is_empty() {
            tracing::info!(
                count = report.evaluations_only.len(),
                "Participants without an actions log are not tabulated"
            );
        }

        report.table = table;
    }

    /// Find the registered parser for a log type.
    fn parser_for_type(&self, log_type: LogType) -> Option<&dyn LogParser> {
        self.parsers
            .iter()
            .find(|p| p.log_type() == log_type)
            .map(|p| p.as_ref())
    }
}

/// Check if a file has an `.xml` extension.
fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}
