//! Evaluations log parser
//!
//! Parses the background log of classifier accuracy snapshots:
//!
//! ```text
//! <MessagePredictorBackgroundLog userid="..." condition="...">
//!   <Evaluations>
//!     <Evaluation dataset="training" order="0" vocabSize="12"><F1Weighted>0.53</F1Weighted></Evaluation>
//!     <featuresAdded dataset="training" order="5" vocabSize="17"><F1Weighted>0.58</F1Weighted></featuresAdded>
//!     <messagesLabeledBoW dataset="training" order="5" vocabSize="900">...</messagesLabeledBoW>
//!     ...
//!   </Evaluations>
//! </MessagePredictorBackgroundLog>
//! ```
//!
//! `Evaluation` elements are timed snapshots; their document order is the
//! time order. The series elements carry their own ordinal in `order`.

use super::record_warning;
use crate::analytics::{reduce_by_ordinal, reduce_windows, Sample};
use crate::error::{Error, Result};
use crate::ingest::parser::{
    child, children, f1_weighted, identity, LogParser, ParseContext, EVALUATIONS_MARKER,
};
use crate::types::{EvaluationsRecord, LogType, ParsedLog, Series};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;

/// Tag of the timed snapshots.
const SNAPSHOT: &str = "Evaluation";

/// Parser for evaluations logs.
#[derive(Debug, Default)]
pub struct EvaluationsParser;

impl EvaluationsParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a document already classified as an evaluations log.
    pub fn parse_record(&self, doc: &Document, ctx: &ParseContext) -> Result<EvaluationsRecord> {
        let (user_id, condition) = identity(doc)?;
        let mut warnings = Vec::new();

        let evaluations = child(doc.root_element(), EVALUATIONS_MARKER).ok_or_else(|| {
            Error::MissingSection {
                section: EVALUATIONS_MARKER.to_string(),
            }
        })?;

        let snapshots: Vec<Sample> = children(evaluations, SNAPSHOT)
            .map(|node| read_sample(node, &mut warnings, ctx))
            .collect();
        let time_buckets = reduce_windows(snapshots, ctx.config.time_window)
            .into_iter()
            .map(|(count, avg)| (ctx.config.time_label(count), avg))
            .collect();

        let mut series = BTreeMap::new();
        for kind in Series::ALL {
            let samples: Vec<(u32, Sample)> = children(evaluations, kind.element_name())
                .filter_map(|node| {
                    let order = read_order(node, &mut warnings, ctx)?;
                    Some((order, read_sample(node, &mut warnings, ctx)))
                })
                .collect();
            tracing::debug!(
                series = kind.element_name(),
                samples = samples.len(),
                "Bucketing evaluation series"
            );
            series.insert(kind, reduce_by_ordinal(samples, ctx.config.bucket_size));
        }

        Ok(EvaluationsRecord {
            user_id,
            condition,
            time_buckets,
            series,
            warnings,
        })
    }
}

impl LogParser for EvaluationsParser {
    fn log_type(&self) -> LogType {
        LogType::Evaluations
    }

    fn parse(&self, doc: &Document, ctx: &ParseContext) -> Result<ParsedLog> {
        self.parse_record(doc, ctx).map(ParsedLog::Evaluations)
    }
}

/// Read the score and vocabulary size of a snapshot.
///
/// An unreadable score becomes an undefined sample rather than failing the log.
fn read_sample(node: Node, warnings: &mut Vec<String>, ctx: &ParseContext) -> Sample {
    let name = node.tag_name().name();
    let f1 = match f1_weighted(node) {
        Ok(f1) => Some(f1),
        Err(e) => {
            record_warning(warnings, ctx.path, format!("<{}>: {}", name, e));
            None
        }
    };
    let vocab_size = match node.attribute("vocabSize").map(|v| v.trim().parse::<u64>()) {
        Some(Ok(size)) => size,
        Some(Err(e)) => {
            record_warning(warnings, ctx.path, format!("<{}> vocabSize: {}", name, e));
            0
        }
        None => {
            record_warning(warnings, ctx.path, format!("<{}> has no vocabSize", name));
            0
        }
    };
    Sample::new(f1, vocab_size)
}

fn read_order(node: Node, warnings: &mut Vec<String>, ctx: &ParseContext) -> Option<u32> {
    let name = node.tag_name().name();
    match node.attribute("order").map(|v| v.trim().parse::<u32>()) {
        Some(Ok(order)) => Some(order),
        Some(Err(e)) => {
            record_warning(warnings, ctx.path, format!("<{}> order: {}", name, e));
            None
        }
        None => {
            record_warning(warnings, ctx.path, format!("<{}> has no order", name));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use std::path::Path;

    fn parse_with(xml: &str, config: &AnalysisConfig) -> Result<EvaluationsRecord> {
        let doc = Document::parse(xml).unwrap();
        let ctx = ParseContext {
            path: Path::new("background.xml"),
            config,
        };
        EvaluationsParser::new().parse_record(&doc, &ctx)
    }

    fn snapshot(tag: &str, order: i64, vocab: u64, f1: &str) -> String {
        format!(
            r#"<{tag} dataset="training" order="{order}" vocabSize="{vocab}"><F1Weighted>{f1}</F1Weighted></{tag}>"#
        )
    }

    fn log(body: &str) -> String {
        format!(
            r#"<MessagePredictorBackgroundLog userid="p01" condition="B"><Evaluations>{}</Evaluations></MessagePredictorBackgroundLog>"#,
            body
        )
    }

    #[test]
    fn test_time_buckets_are_labeled_in_minutes() {
        let body: String = (0..60)
            .map(|i| snapshot("Evaluation", i, 100, "0.5"))
            .collect();
        let record = parse_with(&log(&body), &AnalysisConfig::default()).unwrap();

        assert_eq!(record.user_id, "p01");
        assert_eq!(record.condition, "B");
        assert_eq!(
            record.time_buckets.keys().copied().collect::<Vec<_>>(),
            vec![5, 10, 15, 20, 25, 30]
        );
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_truncated_session_emits_partial_last_bucket() {
        let body: String = (0..59)
            .map(|i| snapshot("Evaluation", i, 100, "0.6"))
            .collect();
        let record = parse_with(&log(&body), &AnalysisConfig::default()).unwrap();

        let last = record.time_buckets[&30];
        assert_eq!(last.events, 9);
        assert!((last.average_f1 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_nan_snapshot_is_excluded_from_average() {
        let mut body: String = (0..9)
            .map(|i| snapshot("Evaluation", i, 50, "1.0"))
            .collect();
        body.push_str(&snapshot("Evaluation", 9, 50, "NaN"));
        let record = parse_with(&log(&body), &AnalysisConfig::default()).unwrap();

        let bucket = record.time_buckets[&5];
        assert_eq!(bucket.events, 10);
        assert_eq!(bucket.contributing, 9);
        assert!((bucket.average_f1 - 0.9).abs() < 1e-12);
        assert_eq!(bucket.average_vocab_size, 50);
    }

    #[test]
    fn test_series_buckets_follow_order_attribute() {
        let body: String = [1, 2, 4, 6, 10]
            .iter()
            .map(|order| snapshot("featuresAdded", *order, 20, "0.7"))
            .chain((1..=5).map(|order| snapshot("messagesLabeledBoW", order, 900, "0.8")))
            .collect();
        let record = parse_with(&log(&body), &AnalysisConfig::default()).unwrap();

        let features = &record.series[&Series::FeaturesAdded];
        assert_eq!(features.keys().copied().collect::<Vec<_>>(), vec![10]);
        assert!(record.series_bucket(Series::FeaturesAdded, 5).is_none());

        let labeled = record.series_bucket(Series::MessagesLabeledBoW, 5).unwrap();
        assert!((labeled.average_f1 - 0.8).abs() < 1e-12);
        assert_eq!(labeled.average_vocab_size, 900);

        assert!(record.series[&Series::MessagesLabeled].is_empty());
        assert!(record.time_buckets.is_empty());
    }

    #[test]
    fn test_series_element_without_order_is_skipped() {
        let body = format!(
            r#"{}<featuresAdded vocabSize="3"><F1Weighted>0.1</F1Weighted></featuresAdded>"#,
            snapshot("featuresAdded", 5, 3, "0.4")
        );
        let record = parse_with(&log(&body), &AnalysisConfig::default()).unwrap();

        assert_eq!(record.series[&Series::FeaturesAdded].len(), 1);
        assert!(record.warnings.iter().any(|w| w.contains("no order")));
    }

    #[test]
    fn test_custom_window() {
        let config = AnalysisConfig {
            time_window: 4,
            snapshots_per_minute: 1,
            ..Default::default()
        };
        let body: String = (0..8)
            .map(|i| snapshot("Evaluation", i, 10, "0.5"))
            .collect();
        let record = parse_with(&log(&body), &config).unwrap();

        assert_eq!(
            record.time_buckets.keys().copied().collect::<Vec<_>>(),
            vec![4, 8]
        );
    }

    #[test]
    fn test_missing_container() {
        let err = parse_with(
            r#"<Log userid="p02" condition="A"><Other/></Log>"#,
            &AnalysisConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingSection { section } if section == "Evaluations"));
    }
}
