//! Per-season validation CLI.
//!
//! Builds a data quality report for one collected season and writes it as
//! JSON, either to the given output path or under the data directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use courtside::collector::validate_season;
use courtside::config::Config;

/// NCAA basketball season data validator
#[derive(Parser, Debug)]
#[command(name = "validate", version, about = "Validate collected season data")]
struct Cli {
    /// Season year to validate
    #[arg(long)]
    season: i32,

    /// Base directory for collected data
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Output path for the quality report JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::default();
    config.data_dir_override(&cli.data_dir);

    let report = match validate_season(&config.storage, cli.season) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Validation failed for season {}: {e}", cli.season);
            return ExitCode::from(1);
        }
    };

    let output = cli.output.unwrap_or_else(|| {
        config
            .storage
            .data_dir
            .join("validated")
            .join(format!("{}.json", cli.season))
    });

    if let Some(parent) = output.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create output directory: {e}");
            return ExitCode::from(1);
        }
    }

    let json = match serde_json::to_vec_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize report: {e}");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = std::fs::write(&output, json) {
        log::error!("Failed to write report to {}: {e}", output.display());
        return ExitCode::from(1);
    }

    println!("Season {} validation:", cli.season);
    println!("Rows: {}", report.total_rows());
    println!("Issues: {}", report.data_issues.len());
    for issue in &report.data_issues {
        println!("  - {issue}");
    }
    println!("Report written to {}", output.display());

    ExitCode::SUCCESS
}
