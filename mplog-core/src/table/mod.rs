//! Tabular output (Layer 2)
//!
//! One row per participant with an actions record, sorted by ID:
//!
//! | Columns | Source |
//! |---------|--------|
//! | `ID` .. `F1GainPerActionBoW` | [`ActionsRecord`] |
//! | `f1Avg{n}`, `vocabSizeAvg{n}` | coarse time buckets of the [`EvaluationsRecord`] |
//! | `f1FA{n}`, `f1FABoW{n}`, `f1ML{n}`, `f1MLBoW{n}` | named-series buckets |
//! | remaining | questionnaire columns, see [`AggregatedTable::merge`] |
//!
//! Undefined values are written as empty cells.

mod questionnaire;

pub use questionnaire::Questionnaire;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::format::format_score;
use crate::ingest::UserLogs;
use crate::types::{ActionsRecord, EvaluationsRecord, Series};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Leading columns filled from the actions record.
pub const ACTIONS_COLUMNS: [&str; 23] = [
    "ID",
    "Condition",
    "F1Train",
    "F1Test",
    "F1TrainBoW",
    "F1TestBoW",
    "F1TrainOnlySysWeight",
    "F1TestOnlySysWeight",
    "F1TrainOnlyHighIG",
    "F1TestOnlyHighIG",
    "MessagesLabeled",
    "MessagesLabeledPoorly",
    "FeaturesAdded",
    "FeaturesRemoved",
    "SystemFeaturesRemoved",
    "FeaturesAdjusted",
    "MessageViews",
    "FolderViews",
    "Undos",
    "F1Gain",
    "F1GainBoW",
    "F1GainPerAction",
    "F1GainPerActionBoW",
];

/// One participant's row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub user_id: String,
    pub cells: Vec<String>,
}

/// The final output of an aggregation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedTable {
    pub header: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl AggregatedTable {
    /// Header of a table built with `config`.
    pub fn header_for(config: &AnalysisConfig) -> Vec<String> {
        let mut header: Vec<String> = ACTIONS_COLUMNS.iter().map(|c| c.to_string()).collect();
        let labels = config.time_labels();
        header.extend(labels.iter().map(|l| format!("f1Avg{}", l)));
        header.extend(labels.iter().map(|l| format!("vocabSizeAvg{}", l)));
        for series in Series::ALL {
            header.extend(
                config
                    .series_indices()
                    .iter()
                    .map(|i| format!("{}{}", series.column_prefix(), i)),
            );
        }
        header
    }

    /// Build the table from grouped records.
    ///
    /// Only participants with an actions record get a row. Rows that cannot
    /// be assembled are returned alongside the table instead of failing it.
    pub fn build(
        groups: &BTreeMap<String, UserLogs>,
        config: &AnalysisConfig,
    ) -> (Self, Vec<(String, Error)>) {
        let mut rows = Vec::new();
        let mut excluded = Vec::new();

        for (user_id, logs) in groups {
            let Some(actions) = &logs.actions else {
                continue;
            };
            match build_row(actions, logs.evaluations.as_ref(), config) {
                Ok(cells) => rows.push(TableRow {
                    user_id: user_id.clone(),
                    cells,
                }),
                Err(e) => excluded.push((user_id.clone(), e)),
            }
        }

        let table = Self {
            header: Self::header_for(config),
            rows,
        };
        (table, excluded)
    }

    /// Look up a cell by participant and column name.
    pub fn cell(&self, user_id: &str, column: &str) -> Option<&str> {
        let index = self.header.iter().position(|h| h == column)?;
        self.rows
            .iter()
            .find(|r| r.user_id == user_id)
            .and_then(|r| r.cells.get(index))
            .map(String::as_str)
    }

    /// Left-join questionnaire rows onto this table by participant ID.
    ///
    /// The first `skip_columns` questionnaire columns (the key, at least) are
    /// not appended. Fails with [`Error::UnmatchedKey`] if any participant has
    /// no questionnaire row.
    pub fn merge(self, questionnaire: &Questionnaire, skip_columns: usize) -> Result<Self> {
        let mut header = self.header;
        header.extend(questionnaire.header().iter().skip(skip_columns).cloned());

        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                let answers = questionnaire
                    .row(&row.user_id)
                    .ok_or_else(|| Error::UnmatchedKey(row.user_id.clone()))?;
                row.cells.extend(answers.iter().skip(skip_columns).cloned());
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { header, rows })
    }
}

fn build_row(
    actions: &ActionsRecord,
    evaluations: Option<&EvaluationsRecord>,
    config: &AnalysisConfig,
) -> Result<Vec<String>> {
    let scores = &actions.scores;
    let counts = &actions.counts;
    let gains = &actions.gains;

    let mut cells = vec![
        actions.user_id.clone(),
        actions.condition.clone(),
        format_score(scores.f1_final_training, 3),
        format_score(scores.f1_final_test, 3),
        format_score(scores.f1_final_training_bow, 3),
        format_score(scores.f1_final_test_bow, 3),
        format_score(scores.f1_final_training_only_sys_weight, 3),
        format_score(scores.f1_final_test_only_sys_weight, 3),
        format_score(scores.f1_final_training_only_high_ig_features, 3),
        format_score(scores.f1_final_test_only_high_ig_features, 3),
        counts.messages_labeled.to_string(),
        counts.messages_labeled_wrong.to_string(),
        counts.features_added.to_string(),
        counts.features_removed.to_string(),
        counts.system_features_removed.to_string(),
        counts.features_adjusted.to_string(),
        counts.message_views.to_string(),
        counts.folder_views.to_string(),
        counts.undos.to_string(),
        format_score(gains.f1_gain, 3),
        format_score(gains.f1_gain_bow, 3),
        format_score(gains.f1_gain_per_action, 5),
        format_score(gains.f1_gain_per_action_bow, 5),
    ];

    let labels = config.time_labels();
    let indices = config.series_indices();

    match evaluations {
        Some(evaluations) => {
            let buckets = labels
                .iter()
                .map(|label| {
                    evaluations
                        .time_buckets
                        .get(label)
                        .ok_or_else(|| Error::IncompleteRow {
                            user_id: actions.user_id.clone(),
                            field: format!("f1Avg{}", label),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            cells.extend(buckets.iter().map(|b| format_score(Some(b.average_f1), 3)));
            cells.extend(buckets.iter().map(|b| b.average_vocab_size.to_string()));

            for series in Series::ALL {
                cells.extend(indices.iter().map(|i| {
                    format_score(
                        evaluations
                            .series_bucket(series, *i)
                            .map(|b| b.average_f1),
                        3,
                    )
                }));
            }
        }
        None => {
            let blanks = labels.len() * 2 + indices.len() * Series::ALL.len();
            cells.extend(std::iter::repeat(String::new()).take(blanks));
        }
    }

    Ok(cells)
}

/// Write the table as CSV, header first.
pub fn write_csv<W: Write>(table: &AggregatedTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&table.header)?;
    for row in &table.rows {
        csv_writer.write_record(&row.cells)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the table as a CSV file.
pub fn write_csv_file(table: &AggregatedTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, file)?;
    tracing::info!(
        path = %path.display(),
        rows = table.rows.len(),
        "Wrote table"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ActionCounts, BucketAverage, FinalScores, GainMetrics,
    };

    fn actions(user_id: &str) -> ActionsRecord {
        ActionsRecord {
            user_id: user_id.to_string(),
            condition: "A".to_string(),
            started_at: None,
            ended_at: None,
            counts: ActionCounts {
                messages_labeled: 5,
                messages_labeled_wrong: 1,
                ..Default::default()
            },
            scores: FinalScores {
                f1_final_training: Some(0.8),
                ..Default::default()
            },
            gains: GainMetrics {
                f1_gain: Some(0.25),
                f1_gain_per_action: Some(0.05),
                ..Default::default()
            },
            topic_confidence: BTreeMap::new(),
            warnings: vec![],
        }
    }

    fn bucket(f1: f64) -> BucketAverage {
        BucketAverage {
            average_f1: f1,
            average_vocab_size: 40,
            events: 10,
            contributing: 10,
        }
    }

    fn evaluations(user_id: &str, labels: &[u32]) -> EvaluationsRecord {
        let mut series = BTreeMap::new();
        series.insert(
            Series::FeaturesAdded,
            BTreeMap::from([(5, bucket(0.6)), (15, bucket(0.7))]),
        );
        EvaluationsRecord {
            user_id: user_id.to_string(),
            condition: "A".to_string(),
            time_buckets: labels.iter().map(|l| (*l, bucket(0.5))).collect(),
            series,
            warnings: vec![],
        }
    }

    fn groups(entries: Vec<(&str, UserLogs)>) -> BTreeMap<String, UserLogs> {
        entries
            .into_iter()
            .map(|(id, logs)| (id.to_string(), logs))
            .collect()
    }

    #[test]
    fn test_header_layout() {
        let header = AggregatedTable::header_for(&AnalysisConfig::default());
        assert_eq!(header.len(), 23 + 6 + 6 + 4 * 20);
        assert_eq!(header[0], "ID");
        assert_eq!(header[23], "f1Avg5");
        assert_eq!(header[29], "vocabSizeAvg5");
        assert_eq!(header[35], "f1FA5");
        assert_eq!(header.last().unwrap(), "f1MLBoW100");
    }

    #[test]
    fn test_row_with_evaluations() {
        let config = AnalysisConfig::default();
        let groups = groups(vec![(
            "u1",
            UserLogs {
                actions: Some(actions("u1")),
                evaluations: Some(evaluations("u1", &[5, 10, 15, 20, 25, 30])),
            },
        )]);
        let (table, excluded) = AggregatedTable::build(&groups, &config);

        assert!(excluded.is_empty());
        assert_eq!(table.rows[0].cells.len(), table.header.len());
        assert_eq!(table.cell("u1", "F1Train"), Some("0.800"));
        assert_eq!(table.cell("u1", "F1Test"), Some(""));
        assert_eq!(table.cell("u1", "MessagesLabeledPoorly"), Some("1"));
        assert_eq!(table.cell("u1", "F1GainPerAction"), Some("0.05000"));
        assert_eq!(table.cell("u1", "f1Avg30"), Some("0.500"));
        assert_eq!(table.cell("u1", "vocabSizeAvg10"), Some("40"));
        assert_eq!(table.cell("u1", "f1FA5"), Some("0.600"));
        assert_eq!(table.cell("u1", "f1FA10"), Some(""));
        assert_eq!(table.cell("u1", "f1MLBoW5"), Some(""));
    }

    #[test]
    fn test_row_without_evaluations_is_blank() {
        let groups = groups(vec![(
            "u1",
            UserLogs {
                actions: Some(actions("u1")),
                evaluations: None,
            },
        )]);
        let (table, excluded) = AggregatedTable::build(&groups, &AnalysisConfig::default());

        assert!(excluded.is_empty());
        let row = &table.rows[0];
        assert_eq!(row.cells.len(), table.header.len());
        assert!(row.cells[23..].iter().all(String::is_empty));
    }

    #[test]
    fn test_missing_time_bucket_excludes_row() {
        let groups = groups(vec![
            (
                "u1",
                UserLogs {
                    actions: Some(actions("u1")),
                    evaluations: Some(evaluations("u1", &[5, 10, 15])),
                },
            ),
            (
                "u2",
                UserLogs {
                    actions: Some(actions("u2")),
                    evaluations: None,
                },
            ),
        ]);
        let (table, excluded) = AggregatedTable::build(&groups, &AnalysisConfig::default());

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].user_id, "u2");
        assert_eq!(excluded.len(), 1);
        assert!(matches!(
            &excluded[0].1,
            Error::IncompleteRow { field, .. } if field == "f1Avg20"
        ));
    }

    #[test]
    fn test_write_csv() {
        let table = AggregatedTable {
            header: vec!["ID".to_string(), "Note".to_string()],
            rows: vec![TableRow {
                user_id: "u1".to_string(),
                cells: vec!["u1".to_string(), "a, b".to_string()],
            }],
        };
        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ID,Note\nu1,\"a, b\"\n");
    }
}
