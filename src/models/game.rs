//! Collected row types: games, teams and per-game details.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One game as stored in a season's `games.parquet`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    /// ESPN-assigned game id
    pub id: String,

    /// Game date in YYYY-MM-DD form
    pub date: String,

    /// Home team id
    pub home_team_id: String,

    /// Home team display name
    pub home_team_name: String,

    /// Away team id
    pub away_team_id: String,

    /// Away team display name
    pub away_team_name: String,

    /// Home final (or current) score
    pub home_score: i64,

    /// Away final (or current) score
    pub away_score: i64,

    /// Normalized game status (`scheduled`, `in_progress`, `final`, ...)
    pub status: String,

    /// When this row was collected, RFC 3339
    pub collection_timestamp: String,
}

impl Game {
    /// Whether the game has reached a terminal status.
    pub fn is_final(&self) -> bool {
        self.status == "final"
    }

    /// Whether any tracked field differs from `other`.
    ///
    /// Incremental merges only care about score and status changes; the rest
    /// of the row is immutable once the game exists.
    pub fn tracked_fields_differ(&self, other: &Game) -> bool {
        self.home_score != other.home_score
            || self.away_score != other.away_score
            || self.status != other.status
    }
}

/// Normalize an ESPN status type name (`STATUS_FINAL`) to a short form.
pub fn normalize_status(raw: &str) -> String {
    raw.trim_start_matches("STATUS_").to_ascii_lowercase()
}

/// One team as stored in a season's `teams.parquet`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    /// ESPN-assigned team id
    pub id: String,

    /// Team display name
    pub name: String,

    /// Short abbreviation
    pub abbreviation: String,

    /// Conference name (empty when the API omits it)
    pub conference: String,
}

/// Per-game detail row with dynamic statistic columns.
///
/// Statistic keys come from the API (`home_field_goals`, `away_rebounds`,
/// ...) so they are kept as a sorted map rather than fixed fields; the
/// storage layer turns the union of keys into columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameDetail {
    /// ESPN-assigned game id
    pub id: String,

    /// Venue id (empty if unknown)
    pub venue_id: String,

    /// Venue name (empty if unknown)
    pub venue_name: String,

    /// Attendance, if reported
    pub attendance: Option<i64>,

    /// `home_*` / `away_*` statistics keyed by API stat name
    pub stats: BTreeMap<String, f64>,

    /// When this row was collected, RFC 3339
    pub collection_timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game() -> Game {
        Game {
            id: "401520281".to_string(),
            date: "2023-03-01".to_string(),
            home_team_id: "150".to_string(),
            home_team_name: "Duke Blue Devils".to_string(),
            away_team_id: "153".to_string(),
            away_team_name: "North Carolina Tar Heels".to_string(),
            home_score: 75,
            away_score: 70,
            status: "final".to_string(),
            collection_timestamp: "2023-03-02T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_is_final() {
        let mut game = sample_game();
        assert!(game.is_final());
        game.status = "in_progress".to_string();
        assert!(!game.is_final());
    }

    #[test]
    fn test_tracked_fields_differ() {
        let game = sample_game();
        let mut updated = game.clone();
        assert!(!game.tracked_fields_differ(&updated));

        updated.home_score = 80;
        assert!(game.tracked_fields_differ(&updated));

        let mut renamed = game.clone();
        renamed.home_team_name = "Duke".to_string();
        // Name changes are not tracked
        assert!(!game.tracked_fields_differ(&renamed));
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("STATUS_FINAL"), "final");
        assert_eq!(normalize_status("STATUS_IN_PROGRESS"), "in_progress");
        assert_eq!(normalize_status("final"), "final");
    }
}
