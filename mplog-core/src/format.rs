//! Formatting helpers shared by the table and console output.

/// Format an optional score with fixed decimals, or an empty cell if undefined.
pub fn format_score(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => String::new(),
    }
}

/// Format an optional score for console output, or an em dash if undefined.
pub fn format_score_or_dash(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "—".to_string(),
    }
}
