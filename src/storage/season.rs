// src/storage/season.rs

//! Per-season consolidated files: games, teams and game details.
//!
//! One directory per season year holding three parquet files, replaced (or
//! merge-rewritten by the collection pipeline) on every run. Conversions
//! between typed rows and [`Table`] live here so every consumer shares one
//! column layout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::game::{Game, GameDetail, Team};
use crate::storage::parquet::{read_table_file, write_table_file};
use crate::storage::table::{Column, ColumnData, Table};

/// Store for per-season consolidated parquet files.
#[derive(Debug, Clone)]
pub struct SeasonStore {
    seasons_dir: PathBuf,
}

impl SeasonStore {
    /// Create a store rooted at the seasons directory.
    pub fn new(seasons_dir: impl Into<PathBuf>) -> Self {
        Self {
            seasons_dir: seasons_dir.into(),
        }
    }

    /// Directory for one season's files.
    pub fn season_dir(&self, season: i32) -> PathBuf {
        self.seasons_dir.join(season.to_string())
    }

    fn games_path(&self, season: i32) -> PathBuf {
        self.season_dir(season).join("games.parquet")
    }

    fn teams_path(&self, season: i32) -> PathBuf {
        self.season_dir(season).join("teams.parquet")
    }

    fn details_path(&self, season: i32) -> PathBuf {
        self.season_dir(season).join("game_details.parquet")
    }

    /// Write a season's games.
    pub async fn write_games(&self, season: i32, games: &[Game]) -> Result<PathBuf> {
        let table = games_table(games);
        let path = self.games_path(season);
        write_table_async(table, path).await
    }

    /// Read a season's games; `None` when nothing has been collected yet.
    /// A corrupt file reads as absent (logged) so collection can recover by
    /// rebuilding it.
    pub async fn read_games(&self, season: i32) -> Option<Vec<Game>> {
        let path = self.games_path(season);
        let table = read_table_async(path).await?;
        match games_from_table(&table) {
            Ok(games) => Some(games),
            Err(e) => {
                log::warn!("Stored games for season {season} are unreadable: {e}");
                None
            }
        }
    }

    /// Write a season's team list.
    pub async fn write_teams(&self, season: i32, teams: &[Team]) -> Result<PathBuf> {
        let table = teams_table(teams);
        let path = self.teams_path(season);
        write_table_async(table, path).await
    }

    /// Write a season's game details.
    pub async fn write_details(&self, season: i32, details: &[GameDetail]) -> Result<PathBuf> {
        let table = details_table(details);
        let path = self.details_path(season);
        write_table_async(table, path).await
    }

    /// Read a season's game details; `None` when absent or unreadable.
    pub async fn read_details(&self, season: i32) -> Option<Vec<GameDetail>> {
        let path = self.details_path(season);
        let table = read_table_async(path).await?;
        match details_from_table(&table) {
            Ok(details) => Some(details),
            Err(e) => {
                log::warn!("Stored details for season {season} are unreadable: {e}");
                None
            }
        }
    }

    /// Read a season's games as a raw table (for cleaning and reporting).
    pub async fn read_games_table(&self, season: i32) -> Option<Table> {
        read_table_async(self.games_path(season)).await
    }
}

async fn write_table_async(table: Table, path: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || {
        write_table_file(&table, &path)?;
        Ok(path)
    })
    .await
    .map_err(|e| AppError::collection("season write task", e))?
}

async fn read_table_async(path: PathBuf) -> Option<Table> {
    if !path.exists() {
        return None;
    }
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || read_table_file(&path))
        .await
        .ok()?
        .map_err(|e| {
            log::warn!("Error reading {display}, treating as absent: {e}");
        })
        .ok()
}

/// Games as a column table.
pub fn games_table(games: &[Game]) -> Table {
    let col_str = |f: fn(&Game) -> &str, name: &str| {
        Column::utf8(name, games.iter().map(|g| Some(f(g).to_string())).collect())
    };
    Table::from_columns(vec![
        col_str(|g| &g.id, "id"),
        col_str(|g| &g.date, "date"),
        col_str(|g| &g.home_team_id, "home_team_id"),
        col_str(|g| &g.home_team_name, "home_team_name"),
        col_str(|g| &g.away_team_id, "away_team_id"),
        col_str(|g| &g.away_team_name, "away_team_name"),
        Column::int64("home_score", games.iter().map(|g| Some(g.home_score)).collect()),
        Column::int64("away_score", games.iter().map(|g| Some(g.away_score)).collect()),
        col_str(|g| &g.status, "status"),
        col_str(|g| &g.collection_timestamp, "collection_timestamp"),
    ])
    .expect("game columns agree on length")
}

/// Games back from a column table.
pub fn games_from_table(table: &Table) -> Result<Vec<Game>> {
    let utf8 = |name: &str| {
        table
            .utf8_values(name)
            .ok_or_else(|| AppError::validation(format!("games table missing column {name}")))
    };
    let int64 = |name: &str| {
        table
            .int64_values(name)
            .ok_or_else(|| AppError::validation(format!("games table missing column {name}")))
    };

    let ids = utf8("id")?;
    let dates = utf8("date")?;
    let home_ids = utf8("home_team_id")?;
    let home_names = utf8("home_team_name")?;
    let away_ids = utf8("away_team_id")?;
    let away_names = utf8("away_team_name")?;
    let home_scores = int64("home_score")?;
    let away_scores = int64("away_score")?;
    let statuses = utf8("status")?;
    let timestamps = utf8("collection_timestamp")?;

    let take = |v: &[Option<String>], i: usize| v[i].clone().unwrap_or_default();
    Ok((0..table.num_rows())
        .map(|i| Game {
            id: take(ids, i),
            date: take(dates, i),
            home_team_id: take(home_ids, i),
            home_team_name: take(home_names, i),
            away_team_id: take(away_ids, i),
            away_team_name: take(away_names, i),
            home_score: home_scores[i].unwrap_or(0),
            away_score: away_scores[i].unwrap_or(0),
            status: take(statuses, i),
            collection_timestamp: take(timestamps, i),
        })
        .collect())
}

/// Teams as a column table.
pub fn teams_table(teams: &[Team]) -> Table {
    Table::from_columns(vec![
        Column::utf8("id", teams.iter().map(|t| Some(t.id.clone())).collect()),
        Column::utf8("name", teams.iter().map(|t| Some(t.name.clone())).collect()),
        Column::utf8(
            "abbreviation",
            teams.iter().map(|t| Some(t.abbreviation.clone())).collect(),
        ),
        Column::utf8(
            "conference",
            teams.iter().map(|t| Some(t.conference.clone())).collect(),
        ),
    ])
    .expect("team columns agree on length")
}

/// Game details as a column table.
///
/// The fixed identity columns come first; the union of every row's dynamic
/// statistic keys follows as nullable float columns.
pub fn details_table(details: &[GameDetail]) -> Table {
    let stat_keys: Vec<String> = details
        .iter()
        .flat_map(|d| d.stats.keys().cloned())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut columns = vec![
        Column::utf8("id", details.iter().map(|d| Some(d.id.clone())).collect()),
        Column::utf8(
            "venue_id",
            details.iter().map(|d| Some(d.venue_id.clone())).collect(),
        ),
        Column::utf8(
            "venue_name",
            details.iter().map(|d| Some(d.venue_name.clone())).collect(),
        ),
        Column::int64("attendance", details.iter().map(|d| d.attendance).collect()),
        Column::utf8(
            "collection_timestamp",
            details
                .iter()
                .map(|d| Some(d.collection_timestamp.clone()))
                .collect(),
        ),
    ];

    for key in stat_keys {
        let values = details.iter().map(|d| d.stats.get(&key).copied()).collect();
        columns.push(Column::float64(key, values));
    }

    Table::from_columns(columns).expect("detail columns agree on length")
}

/// Game details back from a column table.
pub fn details_from_table(table: &Table) -> Result<Vec<GameDetail>> {
    let ids = table
        .utf8_values("id")
        .ok_or_else(|| AppError::validation("details table missing column id"))?;
    let venue_ids = table.utf8_values("venue_id");
    let venue_names = table.utf8_values("venue_name");
    let attendance = table.int64_values("attendance");
    let timestamps = table.utf8_values("collection_timestamp");

    let fixed = [
        "id",
        "venue_id",
        "venue_name",
        "attendance",
        "collection_timestamp",
    ];
    let stat_columns: Vec<(&str, &[Option<f64>])> = table
        .columns()
        .iter()
        .filter(|c| !fixed.contains(&c.name.as_str()))
        .filter_map(|c| match &c.data {
            ColumnData::Float64(v) => Some((c.name.as_str(), v.as_slice())),
            _ => None,
        })
        .collect();

    Ok((0..table.num_rows())
        .map(|i| {
            let mut stats = BTreeMap::new();
            for (name, values) in &stat_columns {
                if let Some(value) = values[i] {
                    stats.insert(name.to_string(), value);
                }
            }
            GameDetail {
                id: ids[i].clone().unwrap_or_default(),
                venue_id: venue_ids
                    .and_then(|v| v[i].clone())
                    .unwrap_or_default(),
                venue_name: venue_names
                    .and_then(|v| v[i].clone())
                    .unwrap_or_default(),
                attendance: attendance.and_then(|v| v[i]),
                stats,
                collection_timestamp: timestamps
                    .and_then(|v| v[i].clone())
                    .unwrap_or_default(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn game(id: &str, home_score: i64) -> Game {
        Game {
            id: id.to_string(),
            date: "2023-03-01".to_string(),
            home_team_id: "150".to_string(),
            home_team_name: "Duke Blue Devils".to_string(),
            away_team_id: "153".to_string(),
            away_team_name: "North Carolina Tar Heels".to_string(),
            home_score,
            away_score: 70,
            status: "final".to_string(),
            collection_timestamp: "2023-03-02T00:00:00Z".to_string(),
        }
    }

    fn detail(id: &str) -> GameDetail {
        let mut stats = BTreeMap::new();
        stats.insert("home_rebounds".to_string(), 30.0);
        stats.insert("away_rebounds".to_string(), 28.0);
        GameDetail {
            id: id.to_string(),
            venue_id: "1914".to_string(),
            venue_name: "Cameron Indoor Stadium".to_string(),
            attendance: Some(9314),
            stats,
            collection_timestamp: "2023-03-02T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_games_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SeasonStore::new(tmp.path());

        let games = vec![game("g1", 75), game("g2", 60)];
        store.write_games(2023, &games).await.unwrap();

        let loaded = store.read_games(2023).await.unwrap();
        assert_eq!(loaded, games);
    }

    #[tokio::test]
    async fn test_read_missing_season() {
        let tmp = TempDir::new().unwrap();
        let store = SeasonStore::new(tmp.path());
        assert!(store.read_games(1999).await.is_none());
    }

    #[tokio::test]
    async fn test_details_round_trip_with_dynamic_columns() {
        let tmp = TempDir::new().unwrap();
        let store = SeasonStore::new(tmp.path());

        let mut second = detail("g2");
        second.stats.insert("home_assists".to_string(), 15.0);
        let details = vec![detail("g1"), second];
        store.write_details(2023, &details).await.unwrap();

        let loaded = store.read_details(2023).await.unwrap();
        assert_eq!(loaded.len(), 2);
        // g1 has no assists column value; g2 does.
        assert!(!loaded[0].stats.contains_key("home_assists"));
        assert_eq!(loaded[1].stats.get("home_assists"), Some(&15.0));
        assert_eq!(loaded[0].stats.get("home_rebounds"), Some(&30.0));
    }

    #[tokio::test]
    async fn test_teams_write() {
        let tmp = TempDir::new().unwrap();
        let store = SeasonStore::new(tmp.path());
        let teams = vec![Team {
            id: "150".to_string(),
            name: "Duke Blue Devils".to_string(),
            abbreviation: "DUKE".to_string(),
            conference: "2".to_string(),
        }];
        let path = store.write_teams(2023, &teams).await.unwrap();
        assert!(path.exists());

        let table = read_table_file(&path).unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(
            table.utf8_values("abbreviation").unwrap()[0],
            Some("DUKE".into())
        );
    }

    #[test]
    fn test_games_from_table_missing_column() {
        let table = Table::from_columns(vec![Column::utf8("id", vec![Some("g1".into())])]).unwrap();
        assert!(games_from_table(&table).is_err());
    }
}
