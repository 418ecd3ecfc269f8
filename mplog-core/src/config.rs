//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/mplog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/mplog/` (~/.config/mplog/)
//! - State/Logs: `$XDG_STATE_HOME/mplog/` (~/.local/state/mplog/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Bucketing and baseline parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Questionnaire merge options
    #[serde(default)]
    pub merge: MergeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters of the aggregation run.
///
/// These were module-level constants in earlier versions of the tooling;
/// they are passed explicitly to the parsers and the aggregator now.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Bucket size for the named evaluation series (ordinal-aligned)
    #[serde(default = "default_bucket_size")]
    pub bucket_size: u32,

    /// Largest series bucket index written to the table
    #[serde(default = "default_series_range")]
    pub series_range: u32,

    /// Number of chronological snapshots per coarse time bucket
    #[serde(default = "default_time_window")]
    pub time_window: u32,

    /// Snapshot frequency, used to label coarse buckets in minutes
    #[serde(default = "default_snapshots_per_minute")]
    pub snapshots_per_minute: u32,

    /// Largest coarse time label (minutes) written to the table
    #[serde(default = "default_time_range")]
    pub time_range: u32,

    /// F1 of the initial classifier on the feature subset
    #[serde(default = "default_baseline_subset_f1")]
    pub baseline_subset_f1: f64,

    /// F1 of the initial bag-of-words classifier
    #[serde(default = "default_baseline_bow_f1")]
    pub baseline_bow_f1: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bucket_size: default_bucket_size(),
            series_range: default_series_range(),
            time_window: default_time_window(),
            snapshots_per_minute: default_snapshots_per_minute(),
            time_range: default_time_range(),
            baseline_subset_f1: default_baseline_subset_f1(),
            baseline_bow_f1: default_baseline_bow_f1(),
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.bucket_size == 0 {
            return Err(Error::Config(
                "analysis.bucket_size must be at least 1".to_string(),
            ));
        }
        if self.time_window == 0 {
            return Err(Error::Config(
                "analysis.time_window must be at least 1".to_string(),
            ));
        }
        if self.snapshots_per_minute == 0 {
            return Err(Error::Config(
                "analysis.snapshots_per_minute must be at least 1".to_string(),
            ));
        }
        // Bucket labels are whole minutes; a window must close on a minute boundary
        if self.time_window % self.snapshots_per_minute != 0 {
            return Err(Error::Config(format!(
                "analysis.time_window ({}) must be a multiple of analysis.snapshots_per_minute ({})",
                self.time_window, self.snapshots_per_minute
            )));
        }
        Ok(())
    }

    /// Label (in minutes) of the coarse bucket that closes after `count` snapshots.
    pub fn time_label(&self, count: u32) -> u32 {
        count / self.snapshots_per_minute
    }

    /// Coarse bucket labels written to the table, in column order.
    pub fn time_labels(&self) -> Vec<u32> {
        let step = self.time_label(self.time_window).max(1);
        (1..)
            .map(|i| i * step)
            .take_while(|label| *label <= self.time_range)
            .collect()
    }

    /// Series bucket indices written to the table, in column order.
    pub fn series_indices(&self) -> Vec<u32> {
        (1..)
            .map(|i| i * self.bucket_size)
            .take_while(|index| *index <= self.series_range)
            .collect()
    }
}

fn default_bucket_size() -> u32 {
    5
}

fn default_series_range() -> u32 {
    100
}

fn default_time_window() -> u32 {
    10
}

fn default_snapshots_per_minute() -> u32 {
    2
}

fn default_time_range() -> u32 {
    30
}

fn default_baseline_subset_f1() -> f64 {
    0.536778303957671
}

fn default_baseline_bow_f1() -> f64 {
    0.76976227167292
}

/// Questionnaire merge options
#[derive(Debug, Deserialize, Clone)]
pub struct MergeConfig {
    /// Leading questionnaire columns that are not appended to the table
    #[serde(default = "default_skip_columns")]
    pub skip_columns: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            skip_columns: default_skip_columns(),
        }
    }
}

fn default_skip_columns() -> usize {
    1
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.analysis.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/mplog/config.toml` (~/.config/mplog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("mplog").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/mplog/` (~/.local/state/mplog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("mplog")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/mplog/mplog.log` (~/.local/state/mplog/mplog.log).
    /// Rotated files carry a date suffix.
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("mplog.log")
    }
}
