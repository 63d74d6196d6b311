// src/ingest/scoreboard.rs

//! Raw scoreboard ingestion into date-partitioned bronze storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use crate::api::client::ApiClient;
use crate::config::CollectionConfig;
use crate::error::Result;
use crate::storage::parquet::{ParquetStorage, RawPayload, WriteOutcome};
use crate::utils::dates::{date_range, format_api_date, season_window};

use super::Ingestion;

/// Which dates a scoreboard ingestion run covers.
#[derive(Debug, Clone)]
pub enum DateSelection {
    /// Explicit list of dates
    Dates(Vec<NaiveDate>),
    /// Inclusive range
    Range { start: NaiveDate, end: NaiveDate },
    /// The day before the run
    Yesterday,
    /// The day of the run
    Today,
    /// Full season windows for the given season years
    Seasons(Vec<i32>),
}

impl DateSelection {
    /// Expand the selection into concrete dates, in order.
    pub fn resolve(&self, window: &CollectionConfig) -> Result<Vec<NaiveDate>> {
        match self {
            Self::Dates(dates) => Ok(dates.clone()),
            Self::Range { start, end } => date_range(*start, *end),
            Self::Yesterday => Ok(vec![Utc::now().date_naive() - Duration::days(1)]),
            Self::Today => Ok(vec![Utc::now().date_naive()]),
            Self::Seasons(seasons) => {
                let mut dates = Vec::new();
                for season in seasons {
                    let (start, end) = season_window(
                        *season,
                        window.season_start_month,
                        window.season_start_day,
                        window.season_end_month,
                        window.season_end_day,
                    )?;
                    dates.extend(date_range(start, end)?);
                }
                Ok(dates)
            }
        }
    }
}

/// Ingests raw scoreboard responses, one row per date.
pub struct ScoreboardIngestion {
    client: Arc<ApiClient>,
    storage: ParquetStorage,
    selection: DateSelection,
    window: CollectionConfig,
    groups: String,
    force_check: bool,
    force_overwrite: bool,
}

impl ScoreboardIngestion {
    pub fn new(
        client: Arc<ApiClient>,
        storage: ParquetStorage,
        selection: DateSelection,
        window: CollectionConfig,
        groups: String,
    ) -> Self {
        Self {
            client,
            storage,
            selection,
            window,
            groups,
            force_check: false,
            force_overwrite: false,
        }
    }

    /// Re-fetch already-stored dates (content hash still dedups writes).
    pub fn with_force_check(mut self, force: bool) -> Self {
        self.force_check = force;
        self
    }

    /// Overwrite stored rows without comparing hashes.
    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }
}

#[async_trait]
impl Ingestion for ScoreboardIngestion {
    type Key = NaiveDate;

    fn name(&self) -> &'static str {
        "scoreboard"
    }

    fn force_check(&self) -> bool {
        self.force_check
    }

    async fn keys(&self) -> Result<Vec<NaiveDate>> {
        self.selection.resolve(&self.window)
    }

    async fn is_processed(&self, key: &NaiveDate) -> bool {
        self.storage.is_date_processed(*key).await
    }

    async fn fetch_and_store(&self, key: &NaiveDate) -> Result<WriteOutcome> {
        let date_str = format_api_date(*key);
        let params = [
            ("dates", date_str.clone()),
            ("groups", self.groups.clone()),
            ("limit", "200".to_string()),
        ];

        let data = self.client.get("scoreboard", &params).await?;

        let mut payload = RawPayload::from_value(
            "scoreboard",
            serde_json::json!({
                "dates": date_str,
                "groups": self.groups,
                "limit": 200,
            }),
            &data,
        );
        payload.force_overwrite = self.force_overwrite;
        self.storage.write_scoreboard(*key, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> CollectionConfig {
        CollectionConfig::default()
    }

    #[test]
    fn test_resolve_explicit_dates() {
        let dates = vec![NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()];
        let selection = DateSelection::Dates(dates.clone());
        assert_eq!(selection.resolve(&window()).unwrap(), dates);
    }

    #[test]
    fn test_resolve_range() {
        let selection = DateSelection::Range {
            start: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 3, 3).unwrap(),
        };
        assert_eq!(selection.resolve(&window()).unwrap().len(), 3);
    }

    #[test]
    fn test_resolve_season_window() {
        let selection = DateSelection::Seasons(vec![2023]);
        let dates = selection.resolve(&window()).unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2022, 11, 1).unwrap());
        assert_eq!(
            *dates.last().unwrap(),
            NaiveDate::from_ymd_opt(2023, 4, 15).unwrap()
        );
    }

    #[test]
    fn test_resolve_yesterday_is_single_day() {
        let selection = DateSelection::Yesterday;
        let dates = selection.resolve(&window()).unwrap();
        assert_eq!(dates.len(), 1);
        assert!(dates[0] < Utc::now().date_naive());
    }
}
