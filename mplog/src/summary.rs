//! Console summary of a single parsed log.

use mplog_core::config::AnalysisConfig;
use mplog_core::format::format_score_or_dash;
use mplog_core::types::{ActionsRecord, Dataset, EvaluationsRecord, ParsedLog, Series};
use std::fmt::Write;

/// Render a parsed log as indented text.
pub fn render(parsed: &ParsedLog, config: &AnalysisConfig, verbose: bool) -> String {
    let mut out = String::new();
    match parsed {
        ParsedLog::Actions(record) => render_actions(&mut out, record),
        ParsedLog::Evaluations(record) => render_evaluations(&mut out, record, config),
    }

    let warnings = parsed.warnings();
    if !warnings.is_empty() {
        let _ = writeln!(out, "  Warnings: {}", warnings.len());
        if verbose {
            for warning in warnings {
                let _ = writeln!(out, "    {}", warning);
            }
        }
    }
    out
}

fn render_actions(out: &mut String, record: &ActionsRecord) {
    let _ = writeln!(
        out,
        "Actions log: {} (condition {})",
        record.user_id, record.condition
    );
    if let Some(minutes) = record.session_minutes() {
        let _ = writeln!(out, "  Session: {:.1} min", minutes);
    }

    let _ = writeln!(out, "  Final F1:");
    for dataset in Dataset::ALL {
        let _ = writeln!(
            out,
            "    {:<28} {}",
            dataset.description(),
            format_score_or_dash(record.scores.get(dataset), 3)
        );
    }

    let counts = &record.counts;
    let _ = writeln!(out, "  Actions:");
    let _ = writeln!(
        out,
        "    {:<28} {} ({} in the wrong folder)",
        "messages labeled", counts.messages_labeled, counts.messages_labeled_wrong
    );
    let _ = writeln!(out, "    {:<28} {}", "features added", counts.features_added);
    let _ = writeln!(
        out,
        "    {:<28} {} ({} system)",
        "features removed", counts.features_removed, counts.system_features_removed
    );
    let _ = writeln!(out, "    {:<28} {}", "features adjusted", counts.features_adjusted);
    let _ = writeln!(out, "    {:<28} {}", "message views", counts.message_views);
    let _ = writeln!(out, "    {:<28} {}", "folder views", counts.folder_views);
    let _ = writeln!(out, "    {:<28} {}", "undos", counts.undos);

    let gains = &record.gains;
    let _ = writeln!(out, "  Gains:");
    let _ = writeln!(out, "    {:<28} {}", "F1 gain", format_score_or_dash(gains.f1_gain, 3));
    let _ = writeln!(
        out,
        "    {:<28} {}",
        "F1 gain (BoW)",
        format_score_or_dash(gains.f1_gain_bow, 3)
    );
    let _ = writeln!(
        out,
        "    {:<28} {}",
        "F1 gain per action",
        format_score_or_dash(gains.f1_gain_per_action, 5)
    );
    let _ = writeln!(
        out,
        "    {:<28} {}",
        "F1 (BoW) per action",
        format_score_or_dash(gains.f1_gain_per_action_bow, 5)
    );

    if !record.topic_confidence.is_empty() {
        let _ = writeln!(out, "  Topic confidence:");
        for (label, confidence) in &record.topic_confidence {
            let _ = writeln!(out, "    {:<28} {:.3}", label, confidence);
        }
    }
}

fn render_evaluations(out: &mut String, record: &EvaluationsRecord, config: &AnalysisConfig) {
    let _ = writeln!(
        out,
        "Evaluations log: {} (condition {})",
        record.user_id, record.condition
    );

    let _ = writeln!(
        out,
        "  Accuracy over time ({} snapshots per bucket):",
        config.time_window
    );
    if record.time_buckets.is_empty() {
        let _ = writeln!(out, "    (no snapshots)");
    }
    for (minute, bucket) in &record.time_buckets {
        let _ = writeln!(
            out,
            "    {:>4} min  F1 {:.3}  vocab {:>5}  ({}/{} scored)",
            minute, bucket.average_f1, bucket.average_vocab_size, bucket.contributing, bucket.events
        );
    }

    let _ = writeln!(out, "  Series (every {} actions):", config.bucket_size);
    for series in Series::ALL {
        let buckets = record.series.get(&series);
        let rendered = buckets
            .filter(|b| !b.is_empty())
            .map(|b| {
                b.iter()
                    .map(|(index, bucket)| format!("{}: {:.3}", index, bucket.average_f1))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "—".to_string());
        let _ = writeln!(out, "    {:<28} {}", series.description(), rendered);
    }
}
