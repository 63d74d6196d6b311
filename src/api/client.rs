// src/api/client.rs

//! ESPN API client.
//!
//! `get` is the sole transport primitive: every request passes through the
//! rate limiter, and non-2xx responses become typed errors (429 separately
//! from the rest). The typed accessors wrap `get` in the retry policy, then
//! decode the JSON into the shapes in [`crate::models::response`].

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::error::{AppError, Result};
use crate::models::game::{Game, Team, normalize_status};
use crate::models::response::{
    AthleteResponse, AthletesPageResponse, GameSummaryResponse, GroupsResponse, RankingsResponse,
    RosterResponse, ScheduleResponse, ScoreboardResponse, StandingsResponse, TeamResponse,
    TeamsResponse,
};
use crate::utils::dates::{date_range, format_api_date, parse_api_date};

use super::limiter::RateLimiter;
use super::retry::RetryPolicy;

/// Result of a single-date scoreboard fetch.
///
/// `date_mismatch` is set when the upstream returned events dated differently
/// from the requested date; ESPN has been observed silently substituting
/// dates, and callers may want to react more strongly than a log line.
#[derive(Debug, Clone, Default)]
pub struct ScoreboardFetch {
    pub games: Vec<Game>,
    pub date_mismatch: bool,
}

/// Client for ESPN's NCAA basketball APIs.
pub struct ApiClient {
    http: reqwest::Client,
    limiter: Mutex<RateLimiter>,
    retry: RetryPolicy,
    base_url: String,
    v3_base_url: String,
    groups: String,
    page_limit: usize,
    debug_responses: bool,
}

impl ApiClient {
    /// Create a configured client. The underlying connection pool lives for
    /// the client's lifetime and closes on drop.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            limiter: Mutex::new(RateLimiter::new(config.rate_limit, config.burst)?),
            retry: RetryPolicy::new(config.max_retries, config.backoff_factor, config.jitter)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            v3_base_url: config.v3_base_url.trim_end_matches('/').to_string(),
            groups: config.groups.clone(),
            page_limit: config.page_limit,
            debug_responses: config.debug_responses,
        })
    }

    /// Issue one rate-limited GET against the site API and return parsed JSON.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.get_from(&self.base_url, endpoint, params).await
    }

    async fn get_from(&self, base: &str, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.limiter.lock().await.acquire().await;

        let url = format!("{}/{}", base, endpoint.trim_start_matches('/'));
        log::debug!("GET {url} params={params:?}");

        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok());
            log::warn!("Rate limit exceeded for {url}");
            return Err(AppError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut message = body.trim().to_string();
            message.truncate(200);
            return Err(AppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = response.json().await?;

        if self.debug_responses {
            self.dump_debug_response(endpoint, params, &data).await;
        }

        Ok(data)
    }

    /// Rate-limited GET with the configured retry policy applied.
    async fn get_retried(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.retry.run(|| self.get(endpoint, params)).await
    }

    async fn get_v3_retried(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.retry
            .run(|| self.get_from(&self.v3_base_url, endpoint, params))
            .await
    }

    /// Dump the raw response as pretty JSON under the temp directory, keyed
    /// by year and endpoint name. Diagnostic only; never read back.
    async fn dump_debug_response(&self, endpoint: &str, params: &[(&str, String)], data: &Value) {
        let Some(date) = params
            .iter()
            .find(|(k, _)| *k == "dates")
            .map(|(_, v)| v.clone())
        else {
            return;
        };
        if date.len() < 4 {
            return;
        }

        let endpoint_name = endpoint.rsplit('/').next().unwrap_or(endpoint);
        let dir: PathBuf = std::env::temp_dir().join("debug_data").join(&date[..4]);
        let file = dir.join(format!("{endpoint_name}_{date}.json"));

        let pretty = match serde_json::to_vec_pretty(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Skipping debug dump: {e}");
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            log::debug!("Failed to create debug dir {}: {e}", dir.display());
            return;
        }
        if let Err(e) = tokio::fs::write(&file, pretty).await {
            log::debug!("Failed to write debug dump {}: {e}", file.display());
        } else {
            log::debug!("Saved debug response to {}", file.display());
        }
    }

    fn decode<T: DeserializeOwned>(context: &str, data: Value) -> Result<T> {
        serde_json::from_value(data).map_err(|e| AppError::schema(context, e))
    }

    /// Fetch the scoreboard for one date (YYYYMMDD).
    ///
    /// The date is validated for calendar correctness before any network
    /// call; the upstream silently "corrects" bad dates instead of erroring.
    pub async fn get_scoreboard(&self, date_str: &str) -> Result<ScoreboardFetch> {
        let requested = parse_api_date(date_str)?;

        log::info!("Fetching scoreboard for {date_str}");
        let params = [
            ("dates", date_str.to_string()),
            ("groups", self.groups.clone()),
            ("limit", "200".to_string()),
        ];
        let data = self.get_retried("scoreboard", &params).await?;
        let response: ScoreboardResponse = Self::decode("scoreboard", data)?;

        let date_mismatch = !events_match_date(&response, requested);
        if date_mismatch {
            log::warn!(
                "Date mismatch: requested games for {requested} but received events on other \
                 dates. The API may have silently corrected the request."
            );
        }

        let games = games_from_scoreboard(&response);
        log::info!("Retrieved {} games for {date_str}", games.len());
        Ok(ScoreboardFetch {
            games,
            date_mismatch,
        })
    }

    /// Fetch scoreboards for every date in an inclusive range.
    ///
    /// Individual dates are allowed to fail (logged and skipped) so a few bad
    /// days cannot abort a season-long fetch. Returns every collected game in
    /// date order; empty when no date produced data.
    pub async fn get_scoreboard_for_date_range(
        &self,
        start_date_str: &str,
        end_date_str: &str,
    ) -> Result<Vec<Game>> {
        let start = parse_api_date(start_date_str)?;
        let end = parse_api_date(end_date_str)?;
        let dates = date_range(start, end)?;

        log::info!(
            "Fetching scoreboard range {start_date_str}..{end_date_str} ({} days)",
            dates.len()
        );

        let mut all_games = Vec::new();
        for date in dates {
            let date_str = format_api_date(date);
            match self.get_scoreboard(&date_str).await {
                Ok(fetch) => {
                    if !fetch.games.is_empty() {
                        log::debug!("Added {} games from {date_str}", fetch.games.len());
                        all_games.extend(fetch.games);
                    }
                }
                Err(e) => {
                    log::error!("Error fetching scoreboard for {date_str}: {e}");
                }
            }
        }

        if all_games.is_empty() {
            log::warn!("No games found in range {start_date_str}..{end_date_str}");
        }
        Ok(all_games)
    }

    /// Fetch one page of the team list.
    pub async fn get_teams(&self, page: u32) -> Result<TeamsResponse> {
        let params = [
            ("page", page.to_string()),
            ("limit", self.page_limit.to_string()),
            ("groups", self.groups.clone()),
        ];
        let data = self.get_retried("teams", &params).await?;
        Self::decode("teams", data)
    }

    /// Fetch every team across all pages.
    ///
    /// Pages are requested from 1 upward until a page comes back smaller than
    /// the first page (or empty). A full last page is ambiguous, so the loop
    /// always issues one more request after it; the empty follow-up page is
    /// the verification that the end was reached.
    pub async fn get_all_teams(&self) -> Result<Vec<Team>> {
        log::info!("Fetching all teams with pagination");

        let mut page = 1u32;
        let first = self.get_teams(page).await?;
        let mut teams: Vec<Team> = first.teams().into_iter().map(team_row).collect();

        let page_size = teams.len();
        if page_size == 0 {
            log::warn!("No teams found on the first page");
            return Ok(teams);
        }

        loop {
            page += 1;
            let response = self.get_teams(page).await?;
            let page_teams: Vec<Team> = response.teams().into_iter().map(team_row).collect();

            if page_teams.is_empty() {
                log::debug!("Reached empty page {page}");
                break;
            }
            let last = page_teams.len() < page_size;
            teams.extend(page_teams);
            if last {
                log::debug!("Reached final page {page}");
                break;
            }
        }

        log::info!("Fetched {} teams across {page} pages", teams.len());
        Ok(teams)
    }

    /// Fetch the detailed summary for one game.
    pub async fn get_game_summary(&self, game_id: &str) -> Result<GameSummaryResponse> {
        let params = [("event", game_id.to_string())];
        let data = self.get_retried("summary", &params).await?;
        Self::decode("summary", data)
    }

    /// Fetch one team's metadata.
    pub async fn get_team(&self, team_id: &str) -> Result<TeamResponse> {
        let endpoint = format!("teams/{team_id}");
        let data = self.get_retried(&endpoint, &[]).await?;
        Self::decode(&endpoint, data)
    }

    /// Fetch a team's roster.
    pub async fn get_team_roster(&self, team_id: &str) -> Result<RosterResponse> {
        let endpoint = format!("teams/{team_id}/roster");
        let data = self.get_retried(&endpoint, &[]).await?;
        Self::decode(&endpoint, data)
    }

    /// Fetch a team's schedule, optionally scoped to a season and type.
    pub async fn get_team_schedule(
        &self,
        team_id: &str,
        season: Option<i32>,
        season_type: Option<i32>,
    ) -> Result<ScheduleResponse> {
        let endpoint = format!("teams/{team_id}/schedule");
        let mut params = Vec::new();
        if let Some(season) = season {
            params.push(("season", season.to_string()));
        }
        if let Some(season_type) = season_type {
            params.push(("seasontype", season_type.to_string()));
        }
        let data = self.get_retried(&endpoint, &params).await?;
        Self::decode(&endpoint, data)
    }

    /// Fetch the current rankings.
    pub async fn get_rankings(&self) -> Result<RankingsResponse> {
        let data = self.get_retried("rankings", &[]).await?;
        Self::decode("rankings", data)
    }

    /// Fetch standings, optionally filtered to one conference group.
    pub async fn get_standings(&self, group_id: Option<&str>) -> Result<StandingsResponse> {
        let mut params = Vec::new();
        if let Some(group_id) = group_id {
            params.push(("group", group_id.to_string()));
        }
        let data = self.get_retried("standings", &params).await?;
        Self::decode("standings", data)
    }

    /// Fetch the conference/group list.
    pub async fn get_conferences(&self) -> Result<GroupsResponse> {
        let data = self.get_retried("groups", &[]).await?;
        Self::decode("groups", data)
    }

    /// Fetch one athlete from the v3 API.
    pub async fn get_athlete(&self, athlete_id: &str) -> Result<AthleteResponse> {
        let endpoint = format!("athletes/{athlete_id}");
        let data = self.get_v3_retried(&endpoint, &[]).await?;
        Self::decode(&endpoint, data)
    }

    /// Fetch one page of the athlete list from the v3 API.
    pub async fn get_athletes(&self, page: u32) -> Result<AthletesPageResponse> {
        let params = [
            ("page", page.to_string()),
            ("limit", self.page_limit.to_string()),
        ];
        let data = self.get_v3_retried("athletes", &params).await?;
        Self::decode("athletes", data)
    }

    /// Fetch every athlete across all pages, with the same size heuristic and
    /// trailing verification request as [`Self::get_all_teams`].
    pub async fn get_all_athletes(&self) -> Result<Vec<Value>> {
        log::info!("Fetching all athletes with pagination");

        let mut page = 1u32;
        let first = self.get_athletes(page).await?;
        let mut athletes = first.items;

        let page_size = athletes.len();
        if page_size == 0 {
            log::warn!("No athletes found on the first page");
            return Ok(athletes);
        }

        loop {
            page += 1;
            let response = self.get_athletes(page).await?;
            if response.items.is_empty() {
                log::debug!("Reached empty page {page}");
                break;
            }
            let last = response.items.len() < page_size;
            athletes.extend(response.items);
            if last {
                log::debug!("Reached final page {page}");
                break;
            }
        }

        log::info!("Fetched {} athletes across {page} pages", athletes.len());
        Ok(athletes)
    }
}

/// Whether every event in the response lands on the requested date.
fn events_match_date(response: &ScoreboardResponse, requested: NaiveDate) -> bool {
    response.events.iter().all(|event| {
        event
            .date
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .is_none_or(|d| d == requested)
    })
}

/// Flatten a scoreboard response into game rows.
///
/// Events without both a home and an away competitor are skipped; the
/// upstream occasionally ships malformed exhibition entries.
fn games_from_scoreboard(response: &ScoreboardResponse) -> Vec<Game> {
    let collected_at = Utc::now().to_rfc3339();
    let mut games = Vec::new();

    for event in &response.events {
        for competition in &event.competitions {
            let home = competition
                .competitors
                .iter()
                .find(|c| c.home_away == "home");
            let away = competition
                .competitors
                .iter()
                .find(|c| c.home_away == "away");
            let (Some(home), Some(away)) = (home, away) else {
                log::warn!("Skipping event {} without both competitors", event.id);
                continue;
            };

            games.push(Game {
                id: event.id.clone(),
                date: event.date.get(..10).unwrap_or(&event.date).to_string(),
                home_team_id: home.team.id.clone(),
                home_team_name: home.team.display_name.clone(),
                away_team_id: away.team.id.clone(),
                away_team_name: away.team.display_name.clone(),
                home_score: parse_score(home.score.as_deref()),
                away_score: parse_score(away.score.as_deref()),
                status: normalize_status(&competition.status.status_type.name),
                collection_timestamp: collected_at.clone(),
            });
        }
    }
    games
}

fn parse_score(score: Option<&str>) -> i64 {
    score.and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn team_row(team: &crate::models::response::TeamRef) -> Team {
    let name = if team.display_name.is_empty() {
        format!("{} {}", team.location, team.name).trim().to_string()
    } else {
        team.display_name.clone()
    };
    Team {
        id: team.id.clone(),
        name,
        abbreviation: team.abbreviation.clone(),
        conference: team.conference_id.clone().unwrap_or_default(),
    }
}
