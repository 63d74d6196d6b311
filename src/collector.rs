// src/collector.rs

//! Multi-season collection orchestration.
//!
//! Drives the collection pipeline across a year range, one season at a time
//! so the shared rate budget is never split, then cleans and validates each
//! successful season and aggregates a cross-season progress report.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{Config, StorageConfig};
use crate::error::{AppError, Result};
use crate::models::report::{ProgressReport, QualityReport, SeasonSummary};
use crate::pipeline::base::{Pipeline, PipelineContext};
use crate::pipeline::collect::{CollectionPipeline, SportsDataSource};
use crate::pipeline::monitor::{MonitorRegistry, MonitoredPipeline};
use crate::quality::{CleaningRule, DataCleaner};
use crate::storage::parquet::{read_table_file, write_table_file};
use crate::storage::season::SeasonStore;
use crate::storage::table::Table;

/// Result of collecting and processing one season.
#[derive(Debug)]
pub struct SeasonOutcome {
    pub season: i32,
    pub status: String,
    pub games_count: usize,
    pub teams_count: usize,
    pub report: Option<QualityReport>,
    pub error: Option<String>,
}

impl SeasonOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == "Success"
    }
}

/// Collects, cleans and validates NCAA data across a range of seasons.
pub struct HistoricalDataCollector {
    start_year: i32,
    end_year: i32,
    storage: StorageConfig,
    pipeline: MonitoredPipeline<CollectionPipeline>,
    cleaner: DataCleaner,
}

impl HistoricalDataCollector {
    /// Build a collector over `[start_year, end_year]`.
    pub fn new(
        config: &Config,
        source: Arc<dyn SportsDataSource>,
        registry: Arc<MonitorRegistry>,
        start_year: i32,
        end_year: i32,
    ) -> Result<Self> {
        if end_year < start_year {
            return Err(AppError::invalid_argument(format!(
                "end year {end_year} is before start year {start_year}"
            )));
        }

        let pipeline = CollectionPipeline::builder()
            .source(source)
            .store(SeasonStore::new(config.storage.seasons_dir()))
            .window(config.collection.clone())
            .build()?;

        log::info!("Initialized historical collector for seasons {start_year}-{end_year}");
        Ok(Self {
            start_year,
            end_year,
            storage: config.storage.clone(),
            pipeline: MonitoredPipeline::new(pipeline, registry),
            cleaner: DataCleaner::new(),
        })
    }

    /// Collect every season sequentially, then clean, validate and persist
    /// each successful season's output. One season's failure never stops the
    /// remaining seasons.
    pub async fn collect_and_process(&mut self) -> Result<Vec<SeasonOutcome>> {
        log::info!(
            "Starting collection for seasons {}-{}",
            self.start_year,
            self.end_year
        );

        let mut outcomes = Vec::new();
        for season in self.start_year..=self.end_year {
            let context = PipelineContext::new()
                .param("season", season)
                .param("mode", "full");
            let result = self.pipeline.execute(&context).await;

            let games_count = result
                .metadata
                .get("games_count")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0) as usize;
            let teams_count = result
                .metadata
                .get("teams_count")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0) as usize;

            if !result.is_success() {
                log::warn!("Skipping processing for failed season {season}");
                outcomes.push(SeasonOutcome {
                    season,
                    status: result.status.name().to_string(),
                    games_count,
                    teams_count,
                    report: None,
                    error: result.error.as_ref().map(|e| e.to_string()),
                });
                continue;
            }

            let games = result
                .output_data
                .get("games")
                .and_then(|d| d.as_table())
                .cloned()
                .unwrap_or_default();

            let (cleaned, report) = self.clean_and_validate(&games);
            if let Err(e) = self.persist_cleaned(season, &cleaned, &report) {
                log::error!("Failed to persist cleaned data for season {season}: {e}");
            }

            log::info!(
                "Processed season {season}: {} rows, {} issues",
                report.total_rows(),
                report.data_issues.len()
            );
            outcomes.push(SeasonOutcome {
                season,
                status: result.status.name().to_string(),
                games_count,
                teams_count,
                report: Some(report),
                error: None,
            });
        }

        log::info!("Completed processing for {} seasons", outcomes.len());
        Ok(outcomes)
    }

    /// Apply the fixed cleaning rules plus generic fixes, and build the
    /// season's quality report.
    fn clean_and_validate(&self, games: &Table) -> (Table, QualityReport) {
        if games.is_empty() {
            log::warn!("No games data found for cleaning and validation");
            return (games.clone(), QualityReport::default());
        }

        let rules = [
            CleaningRule::Clip {
                column: "home_score".to_string(),
                min: 0.0,
                max: 200.0,
            },
            CleaningRule::Clip {
                column: "away_score".to_string(),
                min: 0.0,
                max: 200.0,
            },
            CleaningRule::FillEmpty {
                column: "status".to_string(),
                value: "unknown".to_string(),
            },
        ];

        let cleaned = self.cleaner.clean(games, &rules);
        let cleaned = self.cleaner.fix_common_issues(&cleaned);
        let report = self.cleaner.quality_report(&cleaned, &score_ranges());
        (cleaned, report)
    }

    fn persist_cleaned(&self, season: i32, cleaned: &Table, report: &QualityReport) -> Result<()> {
        let season_dir = self.storage.cleaned_dir().join(season.to_string());
        fs::create_dir_all(&season_dir)?;

        if !cleaned.is_empty() {
            let games_path = season_dir.join("games_cleaned.parquet");
            write_table_file(cleaned, &games_path)?;
            log::info!("Saved cleaned data to {}", games_path.display());
        }

        let report_path = season_dir.join("quality_report.json");
        fs::write(&report_path, serde_json::to_vec_pretty(report)?)?;
        log::info!("Saved quality report to {}", report_path.display());
        Ok(())
    }
}

fn score_ranges() -> HashMap<String, (f64, f64)> {
    let mut ranges = HashMap::new();
    ranges.insert("home_score".to_string(), (0.0, 200.0));
    ranges.insert("away_score".to_string(), (0.0, 200.0));
    ranges
}

/// Aggregate per-season outcomes into the run's final artifact.
pub fn progress_report(outcomes: &[SeasonOutcome]) -> ProgressReport {
    let mut seasons = Vec::new();
    let mut total_games = 0;
    let mut total_teams = 0;
    let mut total_issues = 0;

    for outcome in outcomes {
        let issues = outcome
            .report
            .as_ref()
            .map(|r| r.data_issues.clone())
            .unwrap_or_default();

        total_games += outcome.games_count;
        total_teams += outcome.teams_count;
        total_issues += issues.len();

        seasons.push(SeasonSummary {
            year: outcome.season,
            games_count: outcome.games_count,
            teams_count: outcome.teams_count,
            data_issues: issues,
            status: outcome.status.clone(),
        });
    }

    ProgressReport {
        timestamp: Utc::now().to_rfc3339(),
        total_seasons: seasons.len(),
        seasons,
        total_games,
        total_teams,
        total_issues,
    }
}

/// Write the progress report under the reports directory, timestamped.
pub fn write_progress_report(storage: &StorageConfig, report: &ProgressReport) -> Result<PathBuf> {
    let reports_dir = storage.reports_dir();
    fs::create_dir_all(&reports_dir)?;

    let path = reports_dir.join(format!(
        "collection_report_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::write(&path, serde_json::to_vec_pretty(report)?)?;
    log::info!("Progress report saved to {}", path.display());
    Ok(path)
}

/// Build a quality report for one already-collected season.
pub fn validate_season(storage: &StorageConfig, season: i32) -> Result<QualityReport> {
    let games_path = storage
        .seasons_dir()
        .join(season.to_string())
        .join("games.parquet");
    if !games_path.exists() {
        return Err(AppError::validation(format!(
            "no collected games for season {season} at {}",
            games_path.display()
        )));
    }

    let table = read_table_file(&games_path)?;
    Ok(DataCleaner::new().quality_report(&table, &score_ranges()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::api::client::ScoreboardFetch;
    use crate::models::game::{Game, GameDetail, Team};

    struct OneGameSource;

    #[async_trait]
    impl SportsDataSource for OneGameSource {
        async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardFetch> {
            let target = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
            if date != target {
                return Ok(ScoreboardFetch::default());
            }
            Ok(ScoreboardFetch {
                games: vec![Game {
                    id: "g1".to_string(),
                    date: "2023-03-01".to_string(),
                    home_team_id: "150".to_string(),
                    home_team_name: "Duke Blue Devils".to_string(),
                    away_team_id: "153".to_string(),
                    away_team_name: "North Carolina Tar Heels".to_string(),
                    home_score: 75,
                    away_score: 70,
                    status: "final".to_string(),
                    collection_timestamp: Utc::now().to_rfc3339(),
                }],
                date_mismatch: false,
            })
        }

        async fn all_teams(&self) -> Result<Vec<Team>> {
            Ok(vec![Team {
                id: "150".to_string(),
                name: "Duke Blue Devils".to_string(),
                abbreviation: "DUKE".to_string(),
                conference: String::new(),
            }])
        }

        async fn game_summary(&self, game_id: &str) -> Result<GameDetail> {
            Ok(GameDetail {
                id: game_id.to_string(),
                venue_id: String::new(),
                venue_name: String::new(),
                attendance: None,
                stats: BTreeMap::new(),
                collection_timestamp: Utc::now().to_rfc3339(),
            })
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_collect_and_process_single_season() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        let mut collector = HistoricalDataCollector::new(
            &config,
            Arc::new(OneGameSource),
            Arc::new(MonitorRegistry::new()),
            2023,
            2023,
        )
        .unwrap();

        let outcomes = collector.collect_and_process().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].games_count, 1);
        assert_eq!(outcomes[0].teams_count, 1);
        assert!(outcomes[0].report.is_some());

        // Cleaned output and report landed under the cleaned directory.
        let cleaned_dir = config.storage.cleaned_dir().join("2023");
        assert!(cleaned_dir.join("games_cleaned.parquet").exists());
        assert!(cleaned_dir.join("quality_report.json").exists());

        // The collected season also validates standalone.
        let report = validate_season(&config.storage, 2023).unwrap();
        assert_eq!(report.total_rows(), 1);
    }

    #[tokio::test]
    async fn test_progress_report_totals() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        let mut collector = HistoricalDataCollector::new(
            &config,
            Arc::new(OneGameSource),
            Arc::new(MonitorRegistry::new()),
            2023,
            2023,
        )
        .unwrap();

        let outcomes = collector.collect_and_process().await.unwrap();
        let report = progress_report(&outcomes);

        assert_eq!(report.total_seasons, 1);
        assert_eq!(report.total_games, 1);
        assert_eq!(report.total_teams, 1);
        assert_eq!(report.seasons[0].year, 2023);
        assert_eq!(report.seasons[0].status, "Success");

        let path = write_progress_report(&config.storage, &report).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_validate_missing_season_fails() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        assert!(validate_season(&config.storage, 1999).is_err());
    }

    #[test]
    fn test_reversed_year_range_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let result = HistoricalDataCollector::new(
            &config,
            Arc::new(OneGameSource),
            Arc::new(MonitorRegistry::new()),
            2023,
            2020,
        );
        assert!(result.is_err());
    }
}
