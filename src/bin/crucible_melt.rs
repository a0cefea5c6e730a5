//! crucible-melt: Split a health export into one CSV per record type
//!
//! Usage:
//!   # Write StepCount.csv, HeartRate.csv, ... next to export.xml
//!   crucible-melt apple_health_export/export.xml
//!
//!   # Keep full type identifiers and write elsewhere
//!   crucible-melt export.xml --no-abbreviate --output-dir ./tables
//!
//!   # Extra prefix rule, plus a JSON summary of the run
//!   crucible-melt export.xml --prefix-pattern '^HK.*TypeIdentifier(.+)$' \
//!       --prefix-pattern '^Acme(.+)$' --report melt-report.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use crucible::melt::{HealthExtractor, MeltConfig, DEFAULT_PREFIX_PATTERN};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crucible-melt")]
#[command(about = "Split a health export into one CSV per record type", long_about = None)]
struct Args {
    /// Path to export.xml
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Directory for the CSV files (default: the input's directory)
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Keep full record type identifiers in file names
    #[arg(long)]
    no_abbreviate: bool,

    /// Regex with one capture group used to shorten type identifiers;
    /// repeat to try several in order (replaces the default)
    #[arg(long = "prefix-pattern", value_name = "REGEX")]
    prefix_patterns: Vec<String>,

    /// Only report warnings and errors
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();

    let prefix_patterns = if args.prefix_patterns.is_empty() {
        vec![DEFAULT_PREFIX_PATTERN.to_string()]
    } else {
        args.prefix_patterns
    };

    let config = MeltConfig {
        abbreviate: !args.no_abbreviate,
        prefix_patterns,
        verbose: !args.quiet,
        output_dir: args.output_dir,
    };

    let extractor = HealthExtractor::new(config).context("Invalid melt configuration")?;
    let prepared = extractor
        .load(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    if !args.quiet {
        println!("\n{}", prepared.stats().report());
    }

    let report = extractor
        .write_to_dir(&prepared)
        .context("Failed to write CSV streams")?;

    if report.failed_rows > 0 {
        eprintln!("⚠ Warning: {} row(s) could not be written", report.failed_rows);
    }

    if let Some(report_path) = args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&report_path, json)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    }

    Ok(())
}
