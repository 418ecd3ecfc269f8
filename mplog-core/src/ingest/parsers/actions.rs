//! Actions log parser
//!
//! Parses the interaction log written by the study tool during a session:
//!
//! ```text
//! <MessagePredictorLog userid="..." condition="...">
//!   <WindowOpen time="..."/>
//!   <UserActions>
//!     <AddFeature/> <RemoveFeature><Feature userAdded="False"/></RemoveFeature>
//!     <LabelMessage wrongFolder="True"/> <SelectedMessage/> <Undo/> ...
//!   </UserActions>
//!   <WindowClose time="..."/>
//!   <Evaluation dataset="training"><F1Weighted>0.8</F1Weighted></Evaluation>
//!   <AverageConfidence><TopicAverageConfidence label="Hockey" averageConfidence="0.7"/></AverageConfidence>
//! </MessagePredictorLog>
//! ```
//!
//! # Schema drift
//!
//! Older logs wrote the final `Evaluation` segments inside `UserActions`,
//! newer ones at the root. Each segment is looked up by trying the
//! [`SegmentLocation`]s in [`SegmentLocation::PRIORITY`] order.

use super::record_warning;
use crate::error::{Error, Result};
use crate::ingest::parser::{
    child, children, descendants, f1_weighted, identity, LogParser, ParseContext, ACTIONS_MARKER,
};
use crate::types::{
    ActionCounts, ActionsRecord, Dataset, FinalScores, GainMetrics, LogType, ParsedLog,
};
use chrono::NaiveDateTime;
use roxmltree::{Document, Node};
use std::collections::BTreeMap;

/// Container of the user action events.
const ACTIONS_CONTAINER: &str = "UserActions";

/// Timestamp format written by the study tool.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a final evaluation segment may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentLocation {
    /// Direct child of the log root
    Root,
    /// Direct child of `UserActions`
    Nested,
}

impl SegmentLocation {
    /// Lookup order: root-level segments take precedence.
    pub const PRIORITY: [SegmentLocation; 2] = [SegmentLocation::Root, SegmentLocation::Nested];

    fn container<'a, 'input>(&self, root: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
        match self {
            SegmentLocation::Root => Some(root),
            SegmentLocation::Nested => child(root, ACTIONS_CONTAINER),
        }
    }
}

/// Locate the final evaluation segment for a dataset.
pub fn find_segment<'a, 'input>(
    root: Node<'a, 'input>,
    dataset: Dataset,
) -> Option<(SegmentLocation, Node<'a, 'input>)> {
    SegmentLocation::PRIORITY.iter().find_map(|location| {
        let container = location.container(root)?;
        children(container, "Evaluation")
            .find(|n| n.attribute("dataset") == Some(dataset.as_str()))
            .map(|node| (*location, node))
    })
}

/// Parser for actions logs.
#[derive(Debug, Default)]
pub struct ActionsParser;

impl ActionsParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a document already classified as an actions log.
    pub fn parse_record(&self, doc: &Document, ctx: &ParseContext) -> Result<ActionsRecord> {
        let (user_id, condition) = identity(doc)?;
        let root = doc.root_element();
        let mut warnings = Vec::new();

        let actions = child(root, ACTIONS_CONTAINER).ok_or_else(|| Error::MissingSection {
            section: ACTIONS_CONTAINER.to_string(),
        })?;

        let counts = count_actions(actions);

        let mut scores = FinalScores::default();
        for dataset in Dataset::ALL {
            let score = match find_segment(root, dataset) {
                Some((location, node)) => match f1_weighted(node) {
                    Ok(f1) => {
                        tracing::trace!(dataset = dataset.as_str(), ?location, f1, "Final segment");
                        Some(f1)
                    }
                    Err(e) => {
                        record_warning(
                            &mut warnings,
                            ctx.path,
                            format!("segment '{}': {}", dataset.as_str(), e),
                        );
                        None
                    }
                },
                None => {
                    record_warning(
                        &mut warnings,
                        ctx.path,
                        format!("segment '{}' not found", dataset.as_str()),
                    );
                    None
                }
            };
            scores.set(dataset, score);
        }

        let gains = match GainMetrics::derive(&counts, &scores, ctx.config) {
            Ok(gains) => gains,
            Err(e) => {
                record_warning(&mut warnings, ctx.path, e.to_string());
                GainMetrics::default()
            }
        };

        let started_at = child(root, ACTIONS_MARKER).and_then(|n| {
            parse_time(n, &mut warnings, ctx)
        });
        let ended_at = descendants(root, "WindowClose")
            .next()
            .and_then(|n| parse_time(n, &mut warnings, ctx));

        let topic_confidence = topic_confidence(root, &mut warnings, ctx);

        Ok(ActionsRecord {
            user_id,
            condition,
            started_at,
            ended_at,
            counts,
            scores,
            gains,
            topic_confidence,
            warnings,
        })
    }
}

impl LogParser for ActionsParser {
    fn log_type(&self) -> LogType {
        LogType::Actions
    }

    fn parse(&self, doc: &Document, ctx: &ParseContext) -> Result<ParsedLog> {
        self.parse_record(doc, ctx).map(ParsedLog::Actions)
    }
}

/// Count tracked events anywhere under the actions container.
fn count_actions(actions: Node) -> ActionCounts {
    let count = |name: &str| descendants(actions, name).count() as u32;

    let system_features_removed = descendants(actions, "RemoveFeature")
        .flat_map(|removal| children(removal, "Feature"))
        .filter(|feature| feature.attribute("userAdded") == Some("False"))
        .count() as u32;

    let messages_labeled_wrong = descendants(actions, "LabelMessage")
        .filter(|label| label.attribute("wrongFolder") == Some("True"))
        .count() as u32;

    ActionCounts {
        features_added: count("AddFeature"),
        features_removed: count("RemoveFeature"),
        system_features_removed,
        messages_labeled: count("LabelMessage"),
        messages_labeled_wrong,
        message_views: count("SelectedMessage"),
        folder_views: count("SelectedFolder"),
        features_adjusted: count("FeatureAdjustmentBegin"),
        undos: count("Undo"),
    }
}

fn parse_time(
    node: Node,
    warnings: &mut Vec<String>,
    ctx: &ParseContext,
) -> Option<NaiveDateTime> {
    let name = node.tag_name().name();
    let Some(value) = node.attribute("time") else {
        record_warning(warnings, ctx.path, format!("<{}> has no time", name));
        return None;
    };
    match NaiveDateTime::parse_from_str(value, TIME_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            record_warning(
                warnings,
                ctx.path,
                format!("<{}> time '{}': {}", name, value, e),
            );
            None
        }
    }
}

/// Average prediction confidence per topic, from the first `AverageConfidence` block.
fn topic_confidence(
    root: Node,
    warnings: &mut Vec<String>,
    ctx: &ParseContext,
) -> BTreeMap<String, f64> {
    let mut confidence = BTreeMap::new();
    let Some(block) = descendants(root, "AverageConfidence").next() else {
        return confidence;
    };

    for topic in children(block, "TopicAverageConfidence") {
        let (Some(label), Some(value)) = (
            topic.attribute("label"),
            topic.attribute("averageConfidence"),
        ) else {
            record_warning(warnings, ctx.path, "incomplete TopicAverageConfidence");
            continue;
        };
        match value.trim().parse::<f64>() {
            Ok(v) => {
                confidence.insert(label.to_string(), v);
            }
            Err(e) => record_warning(
                warnings,
                ctx.path,
                format!("confidence for '{}' is '{}': {}", label, value, e),
            ),
        }
    }

    confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use std::path::Path;

    fn parse(xml: &str) -> Result<ActionsRecord> {
        let config = AnalysisConfig::default();
        let doc = Document::parse(xml).unwrap();
        let ctx = ParseContext {
            path: Path::new("test.xml"),
            config: &config,
        };
        ActionsParser::new().parse_record(&doc, &ctx)
    }

    fn evaluation(dataset: &str, f1: &str) -> String {
        format!(
            r#"<Evaluation dataset="{}" order="-1" vocabSize="10"><F1Weighted>{}</F1Weighted></Evaluation>"#,
            dataset, f1
        )
    }

    #[test]
    fn test_end_to_end_counts_and_gains() {
        let xml = format!(
            r#"<MessagePredictorLog userid="u1" condition="A">
                <WindowOpen time="2014-06-10 10:00:00"/>
                <UserActions>
                    <AddFeature/><AddFeature/><AddFeature/>
                    <RemoveFeature><Feature userAdded="False"/></RemoveFeature>
                    <RemoveFeature><Feature userAdded="True"/></RemoveFeature>
                    <LabelMessage wrongFolder="False"/><LabelMessage wrongFolder="True"/>
                    <LabelMessage wrongFolder="False"/><LabelMessage wrongFolder="False"/>
                    <LabelMessage wrongFolder="False"/>
                    <SelectedMessage/><SelectedFolder/><Undo/>
                </UserActions>
                <WindowClose time="2014-06-10 10:30:00"/>
                {}
            </MessagePredictorLog>"#,
            evaluation("training", "0.80")
        );
        let record = parse(&xml).unwrap();

        assert_eq!(record.user_id, "u1");
        assert_eq!(record.condition, "A");
        assert_eq!(record.counts.features_added, 3);
        assert_eq!(record.counts.features_removed, 2);
        assert_eq!(record.counts.system_features_removed, 1);
        assert_eq!(record.counts.messages_labeled, 5);
        assert_eq!(record.counts.messages_labeled_wrong, 1);
        assert_eq!(record.counts.message_views, 1);
        assert_eq!(record.counts.folder_views, 1);
        assert_eq!(record.counts.undos, 1);
        assert_eq!(record.counts.total_user_actions(), 10);
        assert_eq!(record.session_minutes(), Some(30.0));

        let baseline = AnalysisConfig::default().baseline_subset_f1;
        let gain = record.gains.f1_gain.unwrap();
        assert!((gain - (0.80 - baseline)).abs() < 1e-12);
        assert!((record.gains.f1_gain_per_action.unwrap() - gain / 10.0).abs() < 1e-12);
        assert_eq!(record.scores.f1_final_test, None);
    }

    #[test]
    fn test_zero_actions_leave_gains_undefined() {
        let xml = format!(
            r#"<Log userid="u2" condition="B"><WindowOpen/><UserActions><SelectedMessage/></UserActions>{}{}</Log>"#,
            evaluation("training", "0.7"),
            evaluation("trainingBoW", "0.8")
        );
        let record = parse(&xml).unwrap();

        assert_eq!(record.scores.f1_final_training, Some(0.7));
        assert_eq!(record.gains, GainMetrics::default());
        assert!(record
            .warnings
            .iter()
            .any(|w| w.contains("undefined metric")));
    }

    #[test]
    fn test_root_segment_takes_precedence_over_nested() {
        let xml = format!(
            r#"<Log userid="u3" condition="A"><WindowOpen/><UserActions><AddFeature/>{}{}</UserActions>{}</Log>"#,
            evaluation("training", "0.1"),
            evaluation("test", "0.2"),
            evaluation("training", "0.9")
        );
        let record = parse(&xml).unwrap();

        assert_eq!(record.scores.f1_final_training, Some(0.9));
        assert_eq!(record.scores.f1_final_test, Some(0.2));
    }

    #[test]
    fn test_find_segment_reports_location() {
        let xml = format!(
            r#"<Log><UserActions>{}</UserActions></Log>"#,
            evaluation("testBoW", "0.5")
        );
        let doc = Document::parse(&xml).unwrap();
        let (location, _) = find_segment(doc.root_element(), Dataset::TestBoW).unwrap();
        assert_eq!(location, SegmentLocation::Nested);
        assert!(find_segment(doc.root_element(), Dataset::Test).is_none());
    }

    #[test]
    fn test_segment_without_score_is_undefined() {
        let xml = r#"<Log userid="u4" condition="A"><WindowOpen/><UserActions><AddFeature/></UserActions><Evaluation dataset="training"/></Log>"#;
        let record = parse(xml).unwrap();

        assert_eq!(record.scores.f1_final_training, None);
        assert_eq!(record.gains.f1_gain, None);
        assert!(record.warnings.iter().any(|w| w.contains("training")));
    }

    #[test]
    fn test_missing_user_actions() {
        let err = parse(r#"<Log userid="u5" condition="A"><WindowOpen/></Log>"#).unwrap_err();
        assert!(matches!(err, Error::MissingSection { section } if section == "UserActions"));
    }

    #[test]
    fn test_missing_condition() {
        let err = parse(r#"<Log userid="u6"><WindowOpen/><UserActions/></Log>"#).unwrap_err();
        assert!(matches!(err, Error::MalformedLog { attribute } if attribute == "condition"));
    }

    #[test]
    fn test_topic_confidence() {
        let xml = r#"<Log userid="u7" condition="A"><WindowOpen/><UserActions/>
            <AverageConfidence>
                <TopicAverageConfidence label="Hockey" averageConfidence="0.71"/>
                <TopicAverageConfidence label="Baseball" averageConfidence="0.64"/>
                <TopicAverageConfidence label="Unknown"/>
            </AverageConfidence></Log>"#;
        let record = parse(xml).unwrap();

        assert_eq!(record.topic_confidence.len(), 2);
        assert_eq!(record.topic_confidence["Hockey"], 0.71);
        assert_eq!(record.topic_confidence["Baseball"], 0.64);
    }
}
