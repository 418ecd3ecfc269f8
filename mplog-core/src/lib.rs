//! # mplog-core
//!
//! Core library for mplog - an analyzer for Message Predictor experiment logs.
//!
//! This library provides:
//! - Domain types for actions and evaluations records
//! - XML log classification and parsing
//! - Bucketed averaging of classifier accuracy over time
//! - Per-user aggregation, questionnaire merging and CSV output
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Layer 0 (Raw):** XML event logs on disk (immutable)
//! - **Layer 1 (Records):** One typed record per log file
//! - **Layer 2 (Table):** One row per participant, ready for statistics
//!
//! ## Example
//!
//! ```rust,no_run
//! use mplog_core::{Config, LogAggregator};
//!
//! let config = Config::load().expect("failed to load config");
//! let aggregator = LogAggregator::new(config.analysis);
//!
//! let report = aggregator.aggregate_dir("logs/").expect("failed to read log directory");
//! mplog_core::table::write_csv(&report.table, std::io::stdout()).expect("failed to write csv");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{AggregateReport, LogAggregator};
pub use table::{AggregatedTable, Questionnaire};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod table;
pub mod types;
