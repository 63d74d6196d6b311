//! Season-range collection CLI.
//!
//! Collects NCAA basketball data for a range of seasons, then validates the
//! stored output. Exit code 1 means a structural failure of the collection
//! or validation step; individual bad days or games inside an otherwise
//! successful run only show up in the summary counts.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use courtside::api::ApiClient;
use courtside::collector::{self, HistoricalDataCollector};
use courtside::config::Config;
use courtside::pipeline::{ConsoleMonitor, MonitorRegistry};

/// NCAA basketball data collection pipeline
#[derive(Parser, Debug)]
#[command(name = "collect", version, about = "Collect NCAA basketball data from ESPN")]
struct Cli {
    /// First season year to collect
    #[arg(long, default_value_t = 2023)]
    start_year: i32,

    /// Last season year to collect
    #[arg(long, default_value_t = 2023)]
    end_year: i32,

    /// Base directory for collected data
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the collection step
    #[arg(long)]
    skip_collection: bool,

    /// Skip the validation step
    #[arg(long)]
    skip_validation: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!(
        "Collection starting for seasons {}-{}",
        cli.start_year,
        cli.end_year
    );

    let mut config = match &cli.config {
        Some(path) => Config::load_or_default(path),
        None => Config::default(),
    };
    config.data_dir_override(&cli.data_dir);
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }

    let mut outcomes = Vec::new();
    if cli.skip_collection {
        log::info!("Skipping collection step");
    } else {
        let client = match ApiClient::new(&config.api) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::error!("Failed to build API client: {e}");
                return ExitCode::from(1);
            }
        };

        let registry = Arc::new(MonitorRegistry::new());
        registry.register(Arc::new(ConsoleMonitor));

        let mut collector = match HistoricalDataCollector::new(
            &config,
            client,
            registry,
            cli.start_year,
            cli.end_year,
        ) {
            Ok(collector) => collector,
            Err(e) => {
                log::error!("Failed to build collector: {e}");
                return ExitCode::from(1);
            }
        };

        outcomes = match collector.collect_and_process().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                log::error!("Collection failed: {e}");
                return ExitCode::from(1);
            }
        };

        if !outcomes.is_empty() && outcomes.iter().all(|o| !o.succeeded()) {
            log::error!("Every season failed to collect");
            print_summary(&outcomes, 0);
            return ExitCode::from(1);
        }

        let report = collector::progress_report(&outcomes);
        if let Err(e) = collector::write_progress_report(&config.storage, &report) {
            log::error!("Failed to write progress report: {e}");
            return ExitCode::from(1);
        }
    }

    let mut validated = 0usize;
    let mut validation_failed = false;
    if cli.skip_validation {
        log::info!("Skipping validation step");
    } else {
        for season in cli.start_year..=cli.end_year {
            match collector::validate_season(&config.storage, season) {
                Ok(report) => {
                    validated += 1;
                    log::info!(
                        "Season {season} validated: {} rows, {} issues",
                        report.total_rows(),
                        report.data_issues.len()
                    );
                }
                Err(e) => {
                    log::error!("Validation failed for season {season}: {e}");
                    validation_failed = true;
                }
            }
        }
    }

    print_summary(&outcomes, validated);
    if validation_failed {
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn print_summary(outcomes: &[collector::SeasonOutcome], validated: usize) {
    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    let failed = outcomes.len() - succeeded;
    let games: usize = outcomes.iter().map(|o| o.games_count).sum();
    let teams: usize = outcomes.iter().map(|o| o.teams_count).sum();
    let issues: usize = outcomes
        .iter()
        .filter_map(|o| o.report.as_ref())
        .map(|r| r.data_issues.len())
        .sum();

    println!("\nCollection Summary:");
    println!("Seasons succeeded: {succeeded}");
    println!("Seasons failed: {failed}");
    println!("Total games collected: {games}");
    println!("Total teams collected: {teams}");
    println!("Data issues identified: {issues}");
    println!("Seasons validated: {validated}");
}
