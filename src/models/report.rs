//! Quality and progress report records.
//!
//! Serialized as JSON artifacts next to the data they describe; never read
//! back by the pipeline itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-column statistics in a quality report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnStats {
    /// Column name
    pub column: String,

    /// Column data type (`utf8`, `int64`, `float64`)
    pub dtype: String,

    /// Number of null values
    pub null_count: usize,

    /// Number of empty strings (string columns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_count: Option<usize>,

    /// Number of distinct values
    pub unique_count: usize,

    /// Minimum value (numeric columns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    /// Maximum value (numeric columns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    /// Values outside the expected range, when a range applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_range_count: Option<usize>,
}

/// Data quality report for one table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QualityReport {
    /// Dataset-wide statistics (row/column/duplicate counts)
    pub overall_stats: serde_json::Map<String, Value>,

    /// Statistics for each column
    pub column_stats: Vec<ColumnStats>,

    /// Identified data quality issues
    #[serde(default)]
    pub data_issues: Vec<String>,

    /// Matching remediation suggestions, parallel to `data_issues`
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl QualityReport {
    /// Total rows covered by the report.
    pub fn total_rows(&self) -> usize {
        self.overall_stats
            .get("total_rows")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }
}

/// Per-season entry in the cross-season progress report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonSummary {
    /// Season year
    pub year: i32,

    /// Games collected
    pub games_count: usize,

    /// Teams collected
    pub teams_count: usize,

    /// Quality issues identified for the season
    pub data_issues: Vec<String>,

    /// Terminal pipeline status name
    pub status: String,
}

/// Final artifact of a multi-season collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    /// When the report was generated, RFC 3339
    pub timestamp: String,

    /// Per-season breakdown
    pub seasons: Vec<SeasonSummary>,

    /// Games across all seasons
    pub total_games: usize,

    /// Teams across all seasons
    pub total_teams: usize,

    /// Number of seasons covered
    pub total_seasons: usize,

    /// Issues across all seasons
    pub total_issues: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_report_total_rows() {
        let mut report = QualityReport::default();
        assert_eq!(report.total_rows(), 0);
        report
            .overall_stats
            .insert("total_rows".to_string(), Value::from(42));
        assert_eq!(report.total_rows(), 42);
    }

    #[test]
    fn test_progress_report_serializes() {
        let report = ProgressReport {
            timestamp: "2023-04-20T12:00:00Z".to_string(),
            seasons: vec![SeasonSummary {
                year: 2023,
                games_count: 5000,
                teams_count: 362,
                data_issues: vec![],
                status: "Success".to_string(),
            }],
            total_games: 5000,
            total_teams: 362,
            total_seasons: 1,
            total_issues: 0,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"total_games\":5000"));
    }
}
