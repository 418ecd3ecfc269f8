//! mplog - aggregate Message Predictor experiment logs
//!
//! Run against a single log file to print what was extracted from it, or
//! against a directory to write the per-participant CSV table.

mod summary;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use mplog_core::table::{write_csv, write_csv_file};
use mplog_core::{AggregateReport, Config, LogAggregator, Questionnaire};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mplog")]
#[command(about = "Aggregate Message Predictor experiment logs into a CSV table")]
#[command(version)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "dir"])))]
struct Args {
    /// Parse a single log file and print its summary
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Aggregate every log under this directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Write the CSV table here instead of stdout
    #[arg(short, long, requires = "dir")]
    output: Option<PathBuf>,

    /// Questionnaire CSV to merge into the table (first column is the participant ID)
    #[arg(short, long, requires = "dir")]
    questions: Option<PathBuf>,

    /// Summary format for --file: text (default) or json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Verbose output (log to stderr, list every warning)
    #[arg(short, long)]
    verbose: bool,

    /// Use this configuration file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    // Initialize logging
    let _log_guard = mplog_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    let aggregator = LogAggregator::new(config.analysis.clone());

    if let Some(ref file) = args.file {
        let parsed = aggregator
            .parse_file(file)
            .with_context(|| format!("failed to parse {}", file.display()))?;

        if args.format == "json" {
            println!("{}", parsed.to_json()?);
        } else {
            print!("{}", summary::render(&parsed, aggregator.config(), args.verbose));
        }
        return Ok(());
    }

    if let Some(ref dir) = args.dir {
        let mut report = aggregator
            .aggregate_dir(dir)
            .with_context(|| format!("failed to read log directory {}", dir.display()))?;

        let mut table = std::mem::take(&mut report.table);
        if let Some(ref questions) = args.questions {
            let questionnaire = Questionnaire::from_path(questions)
                .with_context(|| format!("failed to read questionnaire {}", questions.display()))?;
            table = table
                .merge(&questionnaire, config.merge.skip_columns)
                .context("failed to merge questionnaire")?;
        }

        print_report(&report, table.rows.len(), args.verbose);

        match args.output {
            Some(ref path) => write_output(&table, path)?,
            None => write_csv(&table, std::io::stdout().lock()).context("failed to write CSV")?,
        }
    }

    Ok(())
}

fn write_output(table: &mplog_core::AggregatedTable, path: &Path) -> Result<()> {
    write_csv_file(table, path).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("Wrote {} row(s) to {}", table.rows.len(), path.display());
    Ok(())
}

/// Print run diagnostics to stderr so stdout stays clean CSV.
fn print_report(report: &AggregateReport, rows: usize, verbose: bool) {
    eprintln!(
        "Processed {} log file(s): {} row(s), {} skipped, {} failed",
        report.files_processed,
        rows,
        report.skipped.len(),
        report.errors.len()
    );

    for (path, e) in &report.errors {
        eprintln!("  [!] {}: {}", path.display(), e);
    }
    for (user_id, e) in &report.excluded_rows {
        eprintln!("  [!] excluded {}: {}", user_id, e);
    }
    if !report.evaluations_only.is_empty() {
        eprintln!(
            "  [-] no actions log for: {}",
            report.evaluations_only.join(", ")
        );
    }

    if verbose {
        for (path, reason) in &report.skipped {
            eprintln!("  [-] skipped {}: {}", path.display(), reason);
        }
        for warning in &report.warnings {
            eprintln!("  [?] {}", warning);
        }
    } else if !report.warnings.is_empty() {
        eprintln!(
            "  {} warning(s), run with --verbose to list them",
            report.warnings.len()
        );
    }
}
