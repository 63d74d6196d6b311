// src/pipeline/collect.rs

//! Season collection pipeline.
//!
//! Fetches a season's games day by day, the team list once, and per-game
//! detail statistics, then writes the three collections to the season store.
//! Individual fetch failures (a bad day, a bad game) are logged and skipped;
//! the pipeline only fails on unrecoverable errors such as storage faults.
//!
//! In incremental mode the pipeline merges into the existing season data:
//! a game row is replaced only when a tracked field (score or status)
//! changed, rows absent from the response are kept, and details are
//! re-fetched only for games that are undetailed or not yet final.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::api::client::{ApiClient, ScoreboardFetch};
use crate::config::CollectionConfig;
use crate::error::{AppError, Result};
use crate::models::game::{Game, GameDetail, Team};
use crate::models::response::GameSummaryResponse;
use crate::storage::season::{SeasonStore, details_table, games_table, teams_table};
use crate::utils::dates::{date_range, format_api_date, season_window};

use super::base::{Pipeline, PipelineContext, PipelineData, PipelineResult, PipelineState};

/// Source of sports data for the collection pipeline.
///
/// The API client is the production implementation; tests substitute stubs.
#[async_trait]
pub trait SportsDataSource: Send + Sync {
    /// Games for one date.
    async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardFetch>;

    /// The full team list.
    async fn all_teams(&self) -> Result<Vec<Team>>;

    /// Detail statistics for one game.
    async fn game_summary(&self, game_id: &str) -> Result<GameDetail>;
}

#[async_trait]
impl SportsDataSource for ApiClient {
    async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardFetch> {
        self.get_scoreboard(&format_api_date(date)).await
    }

    async fn all_teams(&self) -> Result<Vec<Team>> {
        self.get_all_teams().await
    }

    async fn game_summary(&self, game_id: &str) -> Result<GameDetail> {
        let summary = self.get_game_summary(game_id).await?;
        Ok(detail_from_summary(game_id, &summary))
    }
}

/// Flatten a game summary into a detail row.
///
/// Statistic names become `home_*`/`away_*` columns; both the grouped form
/// (`statistics: [{stats: [...]}]`) and the flat form the API also ships are
/// handled.
pub fn detail_from_summary(game_id: &str, summary: &GameSummaryResponse) -> GameDetail {
    let mut stats = BTreeMap::new();

    for team in &summary.boxscore.teams {
        let prefix = if team.home_away == "home" {
            "home"
        } else {
            "away"
        };
        collect_stats(&team.statistics, prefix, &mut stats);
    }

    let (venue_id, venue_name, attendance) = match &summary.game_info {
        Some(info) => (
            info.venue.as_ref().map(|v| v.id.clone()).unwrap_or_default(),
            info.venue
                .as_ref()
                .map(|v| v.full_name.clone())
                .unwrap_or_default(),
            info.attendance,
        ),
        None => (String::new(), String::new(), None),
    };

    GameDetail {
        id: game_id.to_string(),
        venue_id,
        venue_name,
        attendance,
        stats,
        collection_timestamp: Utc::now().to_rfc3339(),
    }
}

fn collect_stats(entries: &[Value], prefix: &str, stats: &mut BTreeMap<String, f64>) {
    for entry in entries {
        if let Some(group) = entry.get("stats").and_then(Value::as_array) {
            collect_stats(group, prefix, stats);
            continue;
        }
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let value = entry.get("value").and_then(Value::as_f64).or_else(|| {
            entry
                .get("displayValue")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
        });
        if let Some(value) = value {
            let key = format!("{prefix}_{}", name.to_ascii_lowercase().replace(' ', "_"));
            stats.insert(key, value);
        }
    }
}

/// Merge freshly fetched games into an existing season.
///
/// Fetched rows replace existing ones only when a tracked field changed;
/// otherwise the existing row (and its original collection timestamp) is
/// kept. Existing games missing from the fetch are retained, new games are
/// added.
pub fn merge_games(existing: Vec<Game>, fetched: Vec<Game>) -> Vec<Game> {
    let existing_by_id: HashMap<String, Game> =
        existing.into_iter().map(|g| (g.id.clone(), g)).collect();
    let mut processed: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for game in fetched {
        processed.insert(game.id.clone());
        match existing_by_id.get(&game.id) {
            Some(old) if !old.tracked_fields_differ(&game) => {
                merged.push(old.clone());
            }
            Some(_) => {
                log::debug!("Updated game: {}", game.id);
                merged.push(game);
            }
            None => {
                log::debug!("New game: {}", game.id);
                merged.push(game);
            }
        }
    }

    for (id, game) in existing_by_id {
        if !processed.contains(&id) {
            merged.push(game);
        }
    }
    merged
}

/// Which games still need a detail fetch.
///
/// Everything without stored details, plus everything not yet final (live
/// games keep refreshing; completed games are fetched once).
pub fn games_needing_details(games: &[Game], existing: &HashMap<String, GameDetail>) -> Vec<String> {
    games
        .iter()
        .filter(|game| !existing.contains_key(&game.id) || !game.is_final())
        .map(|game| game.id.clone())
        .collect()
}

/// Pipeline collecting one season of games, teams and game details.
pub struct CollectionPipeline {
    source: Arc<dyn SportsDataSource>,
    store: SeasonStore,
    window: CollectionConfig,
    state: PipelineState,
}

impl CollectionPipeline {
    /// Builder for constructor injection of the source and store.
    pub fn builder() -> CollectionPipelineBuilder {
        CollectionPipelineBuilder::default()
    }

    /// Collect one season; convenience wrapper around `execute`.
    pub async fn collect_season(&mut self, season: i32, mode: &str) -> PipelineResult {
        let context = PipelineContext::new()
            .param("season", season)
            .param("mode", mode);
        self.execute(&context).await
    }

    /// Collect a range of seasons sequentially, one result per season.
    pub async fn collect_all_seasons(
        &mut self,
        start_year: i32,
        end_year: i32,
    ) -> Vec<PipelineResult> {
        let mut results = Vec::new();
        for year in start_year..=end_year {
            results.push(self.collect_season(year, "full").await);
        }
        results
    }

    async fn collect_games(&self, season: i32, incremental: bool) -> Result<Vec<Game>> {
        log::info!("Collecting games for season {season}");

        let existing = if incremental {
            let existing = self.store.read_games(season).await;
            if let Some(existing) = &existing {
                log::info!(
                    "Found {} existing games for incremental update",
                    existing.len()
                );
            }
            existing
        } else {
            None
        };

        let window = &self.window;
        let (start, end) = season_window(
            season,
            window.season_start_month,
            window.season_start_day,
            window.season_end_month,
            window.season_end_day,
        )?;

        let mut fetched = Vec::new();
        for date in date_range(start, end)? {
            match self.source.scoreboard(date).await {
                Ok(ScoreboardFetch { games, .. }) => {
                    if !games.is_empty() {
                        log::debug!("Retrieved {} games for {date}", games.len());
                        fetched.extend(games);
                    }
                }
                Err(e) => {
                    // One bad day must not abort a season-long fetch.
                    log::error!("Error retrieving games for {date}: {e}");
                }
            }
        }
        log::info!("Retrieved {} total games for season {season}", fetched.len());

        let games = match existing {
            Some(existing) if !existing.is_empty() => {
                let merged = merge_games(existing, fetched);
                log::info!(
                    "Merged data: {} total games after incremental update",
                    merged.len()
                );
                merged
            }
            _ => fetched,
        };

        self.store.write_games(season, &games).await?;
        log::info!("Saved {} games for season {season}", games.len());
        Ok(games)
    }

    async fn collect_teams(&self, season: i32) -> Result<Vec<Team>> {
        log::info!("Collecting teams for season {season}");
        let teams = match self.source.all_teams().await {
            Ok(teams) => teams,
            Err(e) => {
                log::error!("Error retrieving teams for season {season}: {e}");
                return Ok(Vec::new());
            }
        };

        self.store.write_teams(season, &teams).await?;
        log::info!("Saved {} teams for season {season}", teams.len());
        Ok(teams)
    }

    async fn collect_game_details(
        &self,
        season: i32,
        games: &[Game],
        incremental: bool,
    ) -> Result<Vec<GameDetail>> {
        log::info!("Collecting details for {} games", games.len());

        let existing: HashMap<String, GameDetail> = if incremental {
            self.store
                .read_details(season)
                .await
                .unwrap_or_default()
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect()
        } else {
            HashMap::new()
        };

        let ids: Vec<String> = if existing.is_empty() {
            games.iter().map(|g| g.id.clone()).collect()
        } else {
            let ids = games_needing_details(games, &existing);
            log::info!("Filtered to {} games needing details", ids.len());
            ids
        };

        let mut details = Vec::new();
        let mut fetched_ids = HashSet::new();
        for id in ids {
            match self.source.game_summary(&id).await {
                Ok(detail) => {
                    fetched_ids.insert(id);
                    details.push(detail);
                }
                Err(e) => {
                    log::error!("Error collecting details for game {id}: {e}");
                }
            }
        }

        for (id, detail) in existing {
            if !fetched_ids.contains(&id) {
                details.push(detail);
            }
        }

        if details.is_empty() {
            log::warn!("No game details collected");
        } else {
            self.store.write_details(season, &details).await?;
            log::info!("Saved {} game details for season {season}", details.len());
        }
        Ok(details)
    }
}

#[async_trait]
impl Pipeline for CollectionPipeline {
    fn name(&self) -> &str {
        "CollectionPipeline"
    }

    fn state(&self) -> &PipelineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    async fn validate(&mut self, context: &PipelineContext) -> Result<bool> {
        if context.param_i64("season").is_none() {
            log::error!("Missing required parameter: season");
            return Ok(false);
        }

        let mode = context.param_str("mode").unwrap_or("full");
        if mode != "full" && mode != "incremental" {
            log::error!("Invalid mode parameter: {mode}. Must be 'full' or 'incremental'");
            return Ok(false);
        }
        Ok(true)
    }

    async fn run(&mut self, context: &PipelineContext) -> Result<PipelineResult> {
        let season = context
            .param_i64("season")
            .ok_or_else(|| AppError::validation("season parameter missing"))? as i32;
        let mode = context.param_str("mode").unwrap_or("full").to_string();
        let incremental = mode == "incremental";

        log::info!("Starting collection for season {season} in {mode} mode");
        let started = std::time::Instant::now();

        let games = self.collect_games(season, incremental).await?;
        let teams = self.collect_teams(season).await?;
        let details = self
            .collect_game_details(season, &games, incremental)
            .await?;

        let mut metadata = Map::new();
        metadata.insert("season".to_string(), season.into());
        metadata.insert("mode".to_string(), mode.into());
        metadata.insert("games_count".to_string(), games.len().into());
        metadata.insert("teams_count".to_string(), teams.len().into());
        metadata.insert("details_count".to_string(), details.len().into());
        metadata.insert(
            "collection_time".to_string(),
            Utc::now().to_rfc3339().into(),
        );
        metadata.insert(
            "collection_seconds".to_string(),
            started.elapsed().as_secs_f64().into(),
        );

        log::info!(
            "Collection completed for season {season}: {} games, {} teams",
            games.len(),
            teams.len()
        );

        let mut output = HashMap::new();
        output.insert(
            "games".to_string(),
            PipelineData::from(games_table(&games)),
        );
        output.insert(
            "teams".to_string(),
            PipelineData::from(teams_table(&teams)),
        );
        output.insert(
            "game_details".to_string(),
            PipelineData::from(details_table(&details)),
        );

        Ok(PipelineResult::success(output).with_metadata(metadata))
    }
}

/// Builder assembling a [`CollectionPipeline`] from explicit dependencies.
#[derive(Default)]
pub struct CollectionPipelineBuilder {
    source: Option<Arc<dyn SportsDataSource>>,
    store: Option<SeasonStore>,
    window: Option<CollectionConfig>,
}

impl CollectionPipelineBuilder {
    pub fn source(mut self, source: Arc<dyn SportsDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: SeasonStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn window(mut self, window: CollectionConfig) -> Self {
        self.window = Some(window);
        self
    }

    /// Build the pipeline; fails when a dependency was omitted.
    pub fn build(self) -> Result<CollectionPipeline> {
        Ok(CollectionPipeline {
            source: self
                .source
                .ok_or_else(|| AppError::invalid_argument("collection pipeline needs a source"))?,
            store: self
                .store
                .ok_or_else(|| AppError::invalid_argument("collection pipeline needs a store"))?,
            window: self.window.unwrap_or_default(),
            state: PipelineState::default(),
        })
    }
}
