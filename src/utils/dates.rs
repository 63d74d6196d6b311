// src/utils/dates.rs

//! Date helpers for ESPN API requests and season windows.
//!
//! The scoreboard endpoint takes 8-digit YYYYMMDD dates; partition keys use
//! YYYY-MM-DD. Both directions are validated for calendar correctness so a
//! bad date fails here instead of being silently "corrected" upstream.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{AppError, Result};

/// Parse an 8-digit YYYYMMDD string into a date.
///
/// Rejects wrong lengths, non-digit characters, and calendar-invalid dates
/// such as `20230229` (2023 was not a leap year).
pub fn parse_api_date(date_str: &str) -> Result<NaiveDate> {
    if date_str.len() != 8 || !date_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::invalid_date(format!(
            "{date_str:?}: expected YYYYMMDD"
        )));
    }

    let year: i32 = date_str[0..4].parse().map_err(|_| {
        AppError::invalid_date(format!("{date_str:?}: unparseable year"))
    })?;
    let month: u32 = date_str[4..6].parse().unwrap_or(0);
    let day: u32 = date_str[6..8].parse().unwrap_or(0);

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        AppError::invalid_date(format!(
            "{date_str:?}: not a valid calendar date"
        ))
    })
}

/// Check whether a string is a valid YYYYMMDD calendar date.
pub fn is_valid_api_date(date_str: &str) -> bool {
    parse_api_date(date_str).is_ok()
}

/// Format a date as the 8-digit form the API expects.
pub fn format_api_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Format a date as the dashed form used in partition keys.
pub fn format_partition_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a dashed YYYY-MM-DD partition date.
pub fn parse_partition_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
        AppError::invalid_date(format!("{date_str:?}: expected YYYY-MM-DD"))
    })
}

/// All dates from `start` to `end` inclusive.
///
/// Fails if `end` is before `start`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(AppError::invalid_date(format!(
            "end date {end} is before start date {start}"
        )));
    }

    let mut dates = Vec::with_capacity((end - start).num_days() as usize + 1);
    let mut current = start;
    while current <= end {
        dates.push(current);
        current = current + Duration::days(1);
    }
    Ok(dates)
}

/// Partition keys (year, month) for a date.
pub fn partition_keys(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// The collection window for a season year.
///
/// Season 2023 means the 2022-23 season: November 1st 2022 through
/// April 15th 2023.
pub fn season_window(
    season: i32,
    start_month: u32,
    start_day: u32,
    end_month: u32,
    end_day: u32,
) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(season - 1, start_month, start_day)
        .ok_or_else(|| {
            AppError::invalid_date(format!(
                "season {season}: bad window start {start_month}/{start_day}"
            ))
        })?;
    let end = NaiveDate::from_ymd_opt(season, end_month, end_day).ok_or_else(|| {
        AppError::invalid_date(format!(
            "season {season}: bad window end {end_month}/{end_day}"
        ))
    })?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_date_valid() {
        let d = parse_api_date("20230301").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2023, 3, 1));
        // 2024 was a leap year
        assert!(parse_api_date("20240229").is_ok());
    }

    #[test]
    fn test_parse_api_date_invalid() {
        // 2023 was not a leap year
        assert!(parse_api_date("20230229").is_err());
        assert!(parse_api_date("20231301").is_err());
        assert!(parse_api_date("20230232").is_err());
        assert!(parse_api_date("2023-03-01").is_err());
        assert!(parse_api_date("").is_err());
        assert!(parse_api_date("2023030").is_err());
        assert!(parse_api_date("2023abcd").is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let d = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        assert_eq!(format_api_date(d), "20230301");
        assert_eq!(format_partition_date(d), "2023-03-01");
        assert_eq!(parse_partition_date("2023-03-01").unwrap(), d);
    }

    #[test]
    fn test_date_range_inclusive() {
        let start = NaiveDate::from_ymd_opt(2023, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 3, 2).unwrap();
        let range = date_range(start, end).unwrap();
        assert_eq!(range.len(), 4);
        assert_eq!(range[0], start);
        assert_eq!(range[3], end);
    }

    #[test]
    fn test_date_range_single_day() {
        let d = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        assert_eq!(date_range(d, d).unwrap(), vec![d]);
    }

    #[test]
    fn test_date_range_reversed() {
        let start = NaiveDate::from_ymd_opt(2023, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        assert!(date_range(start, end).is_err());
    }

    #[test]
    fn test_season_window() {
        let (start, end) = season_window(2023, 11, 1, 4, 15).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2022, 11, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 4, 15).unwrap());
    }

    #[test]
    fn test_partition_keys() {
        let d = NaiveDate::from_ymd_opt(2022, 11, 14).unwrap();
        assert_eq!(partition_keys(d), (2022, 11));
    }
}
