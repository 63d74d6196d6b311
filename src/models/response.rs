//! Typed shapes for ESPN API responses.
//!
//! Only the fields the pipeline consumes are modeled; the deeply nested
//! remainder stays as raw JSON values. Deserialization failures surface as
//! schema validation errors naming the missing or mismatched field.

use serde::Deserialize;
use serde_json::Value;

/// `scoreboard` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreboardResponse {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A scheduled or played game.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub season: Option<SeasonRef>,
    pub competitions: Vec<Competition>,
}

/// Season year/type attached to an event.
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonRef {
    pub year: i32,
    #[serde(rename = "type", default)]
    pub season_type: i32,
}

/// One competition inside an event (always exactly one for basketball).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: String,
    pub status: CompetitionStatus,
    pub competitors: Vec<Competitor>,
    #[serde(default)]
    pub venue: Option<Value>,
}

/// Game clock/status block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionStatus {
    #[serde(default)]
    pub period: i64,
    #[serde(rename = "type")]
    pub status_type: StatusType,
}

/// Status type with the ESPN name (`STATUS_FINAL` etc.).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

/// One side of a competition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: String,
    pub home_away: String,
    pub team: TeamRef,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub winner: Option<bool>,
}

/// Team reference embedded in competitors and rosters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub conference_id: Option<String>,
}

/// `teams/{id}` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamResponse {
    pub team: TeamRef,
}

/// `teams` endpoint response (paginated).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsResponse {
    #[serde(default)]
    pub sports: Vec<SportEntry>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub page_index: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
}

impl TeamsResponse {
    /// Flatten the sports → leagues → teams nesting into team references.
    pub fn teams(&self) -> Vec<&TeamRef> {
        self.sports
            .iter()
            .flat_map(|s| s.leagues.iter())
            .flat_map(|l| l.teams.iter())
            .map(|entry| &entry.team)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportEntry {
    #[serde(default)]
    pub leagues: Vec<LeagueEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueEntry {
    #[serde(default)]
    pub teams: Vec<TeamEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamEntry {
    pub team: TeamRef,
}

/// `summary` endpoint response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummaryResponse {
    pub boxscore: BoxScore,
    #[serde(default)]
    pub game_info: Option<GameInfo>,
}

/// Boxscore block; per-team statistics stay dynamic.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxScore {
    #[serde(default)]
    pub teams: Vec<BoxScoreTeam>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxScoreTeam {
    #[serde(default)]
    pub home_away: String,
    #[serde(default)]
    pub statistics: Vec<Value>,
}

/// Venue and attendance block of a game summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub attendance: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
}

/// `teams/{id}/roster` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterResponse {
    pub team: TeamRef,
    #[serde(default)]
    pub athletes: Vec<Value>,
}

/// `rankings` endpoint response. Ranking groups stay dynamic.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingsResponse {
    #[serde(default)]
    pub rankings: Vec<Value>,
}

/// `standings` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct StandingsResponse {
    #[serde(default)]
    pub standings: Value,
    #[serde(default)]
    pub children: Vec<Value>,
}

/// `groups` (conferences) endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupsResponse {
    #[serde(default)]
    pub groups: Vec<Value>,
}

/// `teams/{id}/schedule` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub events: Vec<Value>,
}

/// v3 `athletes/{id}` endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteResponse {
    pub athlete: Value,
}

/// v3 `athletes` list endpoint response (paginated).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthletesPageResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub page_index: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoreboard_decodes() {
        let raw = serde_json::json!({
            "events": [{
                "id": "401520281",
                "date": "2023-03-01T00:00Z",
                "name": "North Carolina at Duke",
                "season": {"year": 2023, "type": 2},
                "competitions": [{
                    "id": "401520281",
                    "status": {"period": 2, "type": {"name": "STATUS_FINAL", "completed": true}},
                    "competitors": [
                        {"id": "150", "homeAway": "home",
                         "team": {"id": "150", "displayName": "Duke Blue Devils"},
                         "score": "75"},
                        {"id": "153", "homeAway": "away",
                         "team": {"id": "153", "displayName": "North Carolina Tar Heels"},
                         "score": "70"}
                    ]
                }]
            }]
        });
        let response: ScoreboardResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.events.len(), 1);
        let comp = &response.events[0].competitions[0];
        assert_eq!(comp.status.status_type.name, "STATUS_FINAL");
        assert_eq!(comp.competitors[0].score.as_deref(), Some("75"));
    }

    #[test]
    fn test_scoreboard_missing_id_fails() {
        let raw = serde_json::json!({
            "events": [{"date": "2023-03-01T00:00Z", "competitions": []}]
        });
        assert!(serde_json::from_value::<ScoreboardResponse>(raw).is_err());
    }

    #[test]
    fn test_empty_scoreboard() {
        let response: ScoreboardResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(response.events.is_empty());
    }

    #[test]
    fn test_teams_flattening() {
        let raw = serde_json::json!({
            "sports": [{
                "leagues": [{
                    "teams": [
                        {"team": {"id": "150", "displayName": "Duke Blue Devils",
                                  "abbreviation": "DUKE"}},
                        {"team": {"id": "153", "displayName": "North Carolina Tar Heels"}}
                    ]
                }]
            }]
        });
        let response: TeamsResponse = serde_json::from_value(raw).unwrap();
        let teams = response.teams();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].abbreviation, "DUKE");
    }

    #[test]
    fn test_summary_decodes() {
        let raw = serde_json::json!({
            "boxscore": {
                "teams": [
                    {"homeAway": "home", "statistics": [{"name": "rebounds", "displayValue": "30"}]},
                    {"homeAway": "away", "statistics": []}
                ]
            },
            "gameInfo": {
                "venue": {"id": "1914", "fullName": "Cameron Indoor Stadium"},
                "attendance": 9314
            }
        });
        let response: GameSummaryResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.boxscore.teams.len(), 2);
        let info = response.game_info.unwrap();
        assert_eq!(info.attendance, Some(9314));
        assert_eq!(info.venue.unwrap().full_name, "Cameron Indoor Stadium");
    }
}
