//! Core domain types for mplog
//!
//! These types represent the records (Layer 1) extracted from the two kinds
//! of XML event logs written by the Message Predictor study tool.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Actions log** | Interaction log of one participant session (`WindowOpen` marker) |
//! | **Evaluations log** | Background log of classifier accuracy snapshots (`Evaluations` marker) |
//! | **Segment** | A final `Evaluation` element identified by its `dataset` attribute |
//! | **Series** | Accuracy snapshots taken after every N features added or messages labeled |
//! | **Bucket** | A fixed-size window of samples reduced to a single average |
//! | **BoW** | Bag-of-words classifier variant, tracked as a parallel series |

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================
// Log Type
// ============================================

/// Kind of log file, decided by its marker element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Unknown,
    Actions,
    Evaluations,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Unknown => "unknown",
            LogType::Actions => "actions",
            LogType::Evaluations => "evaluations",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(LogType::Unknown),
            "actions" => Ok(LogType::Actions),
            "evaluations" => Ok(LogType::Evaluations),
            _ => Err(format!("unknown log type: {}", s)),
        }
    }
}

// ============================================
// Final evaluation segments
// ============================================

/// Dataset label of a final evaluation segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Training,
    Test,
    TrainingBoW,
    TestBoW,
    TrainingOnlySysWeight,
    TestOnlySysWeight,
    TrainingOnlyHighIGFeatures,
    TestOnlyHighIGFeatures,
}

impl Dataset {
    pub const ALL: [Dataset; 8] = [
        Dataset::Training,
        Dataset::Test,
        Dataset::TrainingBoW,
        Dataset::TestBoW,
        Dataset::TrainingOnlySysWeight,
        Dataset::TestOnlySysWeight,
        Dataset::TrainingOnlyHighIGFeatures,
        Dataset::TestOnlyHighIGFeatures,
    ];

    /// Value of the `dataset` attribute in the log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Training => "training",
            Dataset::Test => "test",
            Dataset::TrainingBoW => "trainingBoW",
            Dataset::TestBoW => "testBoW",
            Dataset::TrainingOnlySysWeight => "trainingOnlySysWeight",
            Dataset::TestOnlySysWeight => "testOnlySysWeight",
            Dataset::TrainingOnlyHighIGFeatures => "trainingOnlyHighIGFeatures",
            Dataset::TestOnlyHighIGFeatures => "testOnlyHighIGFeatures",
        }
    }

    /// Human-readable description for console summaries.
    pub fn description(&self) -> &'static str {
        match self {
            Dataset::Training => "training",
            Dataset::Test => "test",
            Dataset::TrainingBoW => "training BoW",
            Dataset::TestBoW => "test BoW",
            Dataset::TrainingOnlySysWeight => "training w/o user weights",
            Dataset::TestOnlySysWeight => "test w/o user weights",
            Dataset::TrainingOnlyHighIGFeatures => "training w/o user features",
            Dataset::TestOnlyHighIGFeatures => "test w/o user features",
        }
    }
}

/// Final F1 score per segment. `None` means the segment (or its score) was absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScores {
    pub f1_final_training: Option<f64>,
    pub f1_final_test: Option<f64>,
    pub f1_final_training_bow: Option<f64>,
    pub f1_final_test_bow: Option<f64>,
    pub f1_final_training_only_sys_weight: Option<f64>,
    pub f1_final_test_only_sys_weight: Option<f64>,
    pub f1_final_training_only_high_ig_features: Option<f64>,
    pub f1_final_test_only_high_ig_features: Option<f64>,
}

impl FinalScores {
    pub fn get(&self, dataset: Dataset) -> Option<f64> {
        *self.slot(dataset)
    }

    pub fn set(&mut self, dataset: Dataset, value: Option<f64>) {
        *self.slot_mut(dataset) = value;
    }

    fn slot(&self, dataset: Dataset) -> &Option<f64> {
        match dataset {
            Dataset::Training => &self.f1_final_training,
            Dataset::Test => &self.f1_final_test,
            Dataset::TrainingBoW => &self.f1_final_training_bow,
            Dataset::TestBoW => &self.f1_final_test_bow,
            Dataset::TrainingOnlySysWeight => &self.f1_final_training_only_sys_weight,
            Dataset::TestOnlySysWeight => &self.f1_final_test_only_sys_weight,
            Dataset::TrainingOnlyHighIGFeatures => &self.f1_final_training_only_high_ig_features,
            Dataset::TestOnlyHighIGFeatures => &self.f1_final_test_only_high_ig_features,
        }
    }

    fn slot_mut(&mut self, dataset: Dataset) -> &mut Option<f64> {
        match dataset {
            Dataset::Training => &mut self.f1_final_training,
            Dataset::Test => &mut self.f1_final_test,
            Dataset::TrainingBoW => &mut self.f1_final_training_bow,
            Dataset::TestBoW => &mut self.f1_final_test_bow,
            Dataset::TrainingOnlySysWeight => &mut self.f1_final_training_only_sys_weight,
            Dataset::TestOnlySysWeight => &mut self.f1_final_test_only_sys_weight,
            Dataset::TrainingOnlyHighIGFeatures => {
                &mut self.f1_final_training_only_high_ig_features
            }
            Dataset::TestOnlyHighIGFeatures => &mut self.f1_final_test_only_high_ig_features,
        }
    }
}

// ============================================
// Actions
// ============================================

/// Occurrence counts of tracked user actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCounts {
    pub features_added: u32,
    pub features_removed: u32,
    pub system_features_removed: u32,
    pub messages_labeled: u32,
    pub messages_labeled_wrong: u32,
    pub message_views: u32,
    pub folder_views: u32,
    pub features_adjusted: u32,
    pub undos: u32,
}

impl ActionCounts {
    /// Actions that can change the classifier.
    pub fn total_user_actions(&self) -> u32 {
        self.messages_labeled + self.features_added + self.features_removed + self.features_adjusted
    }
}

/// Accuracy gains relative to the initial classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainMetrics {
    pub f1_gain: Option<f64>,
    pub f1_gain_bow: Option<f64>,
    pub f1_gain_per_action: Option<f64>,
    pub f1_gain_per_action_bow: Option<f64>,
}

impl GainMetrics {
    /// Derive gain metrics from action counts and final scores.
    ///
    /// Fails with [`Error::UndefinedMetric`] when the participant took no
    /// classifier-changing actions. A gain whose final score is absent is
    /// left `None`.
    ///
    /// Note that the per-action BoW figure divides the final BoW score, not
    /// the BoW gain.
    pub fn derive(
        counts: &ActionCounts,
        scores: &FinalScores,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let total = counts.total_user_actions();
        if total == 0 {
            return Err(Error::undefined(
                "f1GainPerAction",
                "participant took no user actions",
            ));
        }
        let total = f64::from(total);

        let f1_gain = scores
            .f1_final_training
            .map(|f1| f1 - config.baseline_subset_f1);
        let f1_gain_bow = scores
            .f1_final_training_bow
            .map(|f1| f1 - config.baseline_bow_f1);

        Ok(Self {
            f1_gain,
            f1_gain_bow,
            f1_gain_per_action: f1_gain.map(|gain| gain / total),
            f1_gain_per_action_bow: scores.f1_final_training_bow.map(|f1| f1 / total),
        })
    }
}

/// Metrics extracted from one actions log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsRecord {
    pub user_id: String,
    /// Experiment arm label
    pub condition: String,
    /// `WindowOpen` time
    pub started_at: Option<NaiveDateTime>,
    /// `WindowClose` time
    pub ended_at: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub counts: ActionCounts,
    #[serde(flatten)]
    pub scores: FinalScores,
    #[serde(flatten)]
    pub gains: GainMetrics,
    /// Average prediction confidence per topic label
    pub topic_confidence: BTreeMap<String, f64>,
    /// Non-fatal problems met while parsing
    pub warnings: Vec<String>,
}

impl ActionsRecord {
    /// Session length in minutes, if both ends were logged.
    pub fn session_minutes(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).num_seconds() as f64 / 60.0)
            }
            _ => None,
        }
    }
}

// ============================================
// Evaluations
// ============================================

/// Averaged accuracy and vocabulary size of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAverage {
    pub average_f1: f64,
    pub average_vocab_size: u64,
    /// Samples that fell into the bucket
    pub events: u32,
    /// Samples whose F1 was a number and entered the average
    pub contributing: u32,
}

/// Named evaluation series logged every N actions of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Series {
    #[serde(rename = "featuresAdded")]
    FeaturesAdded,
    #[serde(rename = "featuresAddedBoW")]
    FeaturesAddedBoW,
    #[serde(rename = "messagesLabeled")]
    MessagesLabeled,
    #[serde(rename = "messagesLabeledBoW")]
    MessagesLabeledBoW,
}

impl Series {
    pub const ALL: [Series; 4] = [
        Series::FeaturesAdded,
        Series::FeaturesAddedBoW,
        Series::MessagesLabeled,
        Series::MessagesLabeledBoW,
    ];

    /// Tag name of the series elements in the log.
    pub fn element_name(&self) -> &'static str {
        match self {
            Series::FeaturesAdded => "featuresAdded",
            Series::FeaturesAddedBoW => "featuresAddedBoW",
            Series::MessagesLabeled => "messagesLabeled",
            Series::MessagesLabeledBoW => "messagesLabeledBoW",
        }
    }

    /// Prefix of the table columns holding this series.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Series::FeaturesAdded => "f1FA",
            Series::FeaturesAddedBoW => "f1FABoW",
            Series::MessagesLabeled => "f1ML",
            Series::MessagesLabeledBoW => "f1MLBoW",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Series::FeaturesAdded => "features added",
            Series::FeaturesAddedBoW => "features added (BoW)",
            Series::MessagesLabeled => "messages labeled",
            Series::MessagesLabeledBoW => "messages labeled (BoW)",
        }
    }
}

/// Metrics extracted from one evaluations log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationsRecord {
    pub user_id: String,
    pub condition: String,
    /// Coarse buckets of the chronological snapshots, keyed by minute label
    pub time_buckets: BTreeMap<u32, BucketAverage>,
    /// Ordinal-aligned buckets per series, keyed by bucket index
    pub series: BTreeMap<Series, BTreeMap<u32, BucketAverage>>,
    /// Non-fatal problems met while parsing
    pub warnings: Vec<String>,
}

impl EvaluationsRecord {
    pub fn series_bucket(&self, series: Series, index: u32) -> Option<&BucketAverage> {
        self.series.get(&series).and_then(|buckets| buckets.get(&index))
    }
}

// ============================================
// Parsed log
// ============================================

/// A record parsed from one log file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedLog {
    Actions(ActionsRecord),
    Evaluations(EvaluationsRecord),
}

impl ParsedLog {
    pub fn log_type(&self) -> LogType {
        match self {
            ParsedLog::Actions(_) => LogType::Actions,
            ParsedLog::Evaluations(_) => LogType::Evaluations,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            ParsedLog::Actions(r) => &r.user_id,
            ParsedLog::Evaluations(r) => &r.user_id,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ParsedLog::Actions(r) => &r.warnings,
            ParsedLog::Evaluations(r) => &r.warnings,
        }
    }

    /// Pretty-printed JSON, tagged with `"type": "actions" | "evaluations"`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(labels: u32, adds: u32, removes: u32, adjusts: u32) -> ActionCounts {
        ActionCounts {
            messages_labeled: labels,
            features_added: adds,
            features_removed: removes,
            features_adjusted: adjusts,
            ..Default::default()
        }
    }

    #[test]
    fn test_log_type_round_trip() {
        for lt in [LogType::Unknown, LogType::Actions, LogType::Evaluations] {
            assert_eq!(lt.as_str().parse::<LogType>().unwrap(), lt);
        }
        assert!("plans".parse::<LogType>().is_err());
    }

    #[test]
    fn test_total_user_actions_ignores_views() {
        let mut c = counts(5, 3, 2, 1);
        c.message_views = 40;
        c.undos = 2;
        assert_eq!(c.total_user_actions(), 11);
    }

    #[test]
    fn test_gains_undefined_without_actions() {
        let scores = FinalScores {
            f1_final_training: Some(0.8),
            f1_final_training_bow: Some(0.9),
            ..Default::default()
        };
        let result = GainMetrics::derive(&counts(0, 0, 0, 0), &scores, &AnalysisConfig::default());
        assert!(matches!(result, Err(Error::UndefinedMetric { .. })));
    }

    #[test]
    fn test_gains_follow_missing_scores() {
        let config = AnalysisConfig::default();
        let scores = FinalScores {
            f1_final_training: Some(0.8),
            ..Default::default()
        };
        let gains = GainMetrics::derive(&counts(4, 0, 0, 0), &scores, &config).unwrap();

        let expected = 0.8 - config.baseline_subset_f1;
        assert!((gains.f1_gain.unwrap() - expected).abs() < 1e-12);
        assert!((gains.f1_gain_per_action.unwrap() - expected / 4.0).abs() < 1e-12);
        assert_eq!(gains.f1_gain_bow, None);
        assert_eq!(gains.f1_gain_per_action_bow, None);
    }

    #[test]
    fn test_per_action_bow_uses_final_score() {
        let scores = FinalScores {
            f1_final_training_bow: Some(0.9),
            ..Default::default()
        };
        let gains =
            GainMetrics::derive(&counts(2, 1, 0, 0), &scores, &AnalysisConfig::default()).unwrap();
        assert!((gains.f1_gain_per_action_bow.unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_final_scores_slots() {
        let mut scores = FinalScores::default();
        for (i, dataset) in Dataset::ALL.iter().enumerate() {
            scores.set(*dataset, Some(i as f64));
        }
        assert_eq!(scores.get(Dataset::Training), Some(0.0));
        assert_eq!(scores.get(Dataset::TestOnlyHighIGFeatures), Some(7.0));
        assert_eq!(scores.f1_final_test_bow, Some(3.0));
    }

    #[test]
    fn test_parsed_log_json_is_tagged() {
        let record = EvaluationsRecord {
            user_id: "u9".to_string(),
            condition: "B".to_string(),
            time_buckets: BTreeMap::new(),
            series: BTreeMap::new(),
            warnings: vec![],
        };
        let json: serde_json::Value =
            serde_json::from_str(&ParsedLog::Evaluations(record).to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "evaluations");
        assert_eq!(json["userId"], "u9");
    }

    #[test]
    fn test_session_minutes() {
        let parse = |s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        let record = ActionsRecord {
            user_id: "u1".to_string(),
            condition: "A".to_string(),
            started_at: Some(parse("2014-06-10 10:00:00")),
            ended_at: Some(parse("2014-06-10 10:30:30")),
            counts: ActionCounts::default(),
            scores: FinalScores::default(),
            gains: GainMetrics::default(),
            topic_confidence: BTreeMap::new(),
            warnings: vec![],
        };
        assert_eq!(record.session_minutes(), Some(30.5));
    }
}
