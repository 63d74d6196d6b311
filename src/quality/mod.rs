// src/quality/mod.rs

//! Data cleaning rules and quality reporting for collected tables.

use std::collections::HashMap;

use serde_json::Value;

use crate::models::report::{ColumnStats, QualityReport};
use crate::storage::table::{ColumnData, Table};

/// A cleaning operation applied to a table.
#[derive(Debug, Clone)]
pub enum CleaningRule {
    /// Clamp a numeric column into `[min, max]`
    Clip { column: String, min: f64, max: f64 },

    /// Replace nulls in a string column
    FillNull { column: String, value: String },

    /// Replace empty strings in a string column
    FillEmpty { column: String, value: String },

    /// Replace nulls in a numeric column with a fixed value
    FillNullNumeric { column: String, value: f64 },

    /// Map specific string values to replacements
    MapValues {
        column: String,
        mapping: HashMap<String, String>,
    },

    /// Drop rows duplicating an earlier row over the key columns
    DropDuplicates { subset: Vec<String> },

    /// Drop rows that are null in the column
    DropNulls { column: String },
}

/// Applies cleaning rules and produces quality reports.
#[derive(Debug, Clone, Default)]
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Apply rules in order, returning the cleaned table.
    pub fn clean(&self, table: &Table, rules: &[CleaningRule]) -> Table {
        log::debug!("Cleaning data with {} rules", rules.len());
        let mut result = table.clone();

        for rule in rules {
            result = self.apply_rule(result, rule);
        }
        result
    }

    fn apply_rule(&self, mut table: Table, rule: &CleaningRule) -> Table {
        match rule {
            CleaningRule::Clip { column, min, max } => {
                table.clip_column(column, *min, *max);
                table
            }
            CleaningRule::FillNull { column, value } => {
                table.fill_null_utf8(column, value);
                table
            }
            CleaningRule::FillEmpty { column, value } => {
                table.fill_empty_utf8(column, value);
                table
            }
            CleaningRule::FillNullNumeric { column, value } => {
                table.fill_null_numeric(column, *value);
                table
            }
            CleaningRule::MapValues { column, mapping } => {
                if let Some(ColumnData::Utf8(values)) =
                    table.column_mut(column).map(|c| &mut c.data)
                {
                    for value in values.iter_mut().flatten() {
                        if let Some(mapped) = mapping.get(value.as_str()) {
                            *value = mapped.clone();
                        }
                    }
                }
                table
            }
            CleaningRule::DropDuplicates { subset } => {
                let subset: Vec<&str> = subset.iter().map(String::as_str).collect();
                table.drop_duplicates(&subset)
            }
            CleaningRule::DropNulls { column } => table.drop_nulls(column),
        }
    }

    /// Fill remaining nulls with column-type-appropriate defaults: string
    /// columns get a sentinel, numeric columns get the column median, and
    /// id-like columns are left untouched.
    pub fn fix_common_issues(&self, table: &Table) -> Table {
        let mut result = table.clone();

        let names: Vec<String> = table.columns().iter().map(|c| c.name.clone()).collect();
        for name in names {
            if is_id_like(&name) {
                continue;
            }
            match table.column(&name).map(|c| &c.data) {
                Some(ColumnData::Utf8(_)) => {
                    result.fill_null_utf8(&name, "UNKNOWN");
                }
                Some(ColumnData::Int64(_)) | Some(ColumnData::Float64(_)) => {
                    if let Some(median) = table.median(&name) {
                        result.fill_null_numeric(&name, median);
                    }
                }
                None => {}
            }
        }
        result
    }

    /// Build a quality report: overall counts, per-column statistics, and an
    /// issue list with matching remediation suggestions.
    ///
    /// `expected_ranges` maps numeric column names to their valid `[min, max]`
    /// for out-of-range counting.
    pub fn quality_report(
        &self,
        table: &Table,
        expected_ranges: &HashMap<String, (f64, f64)>,
    ) -> QualityReport {
        let mut report = QualityReport::default();

        report
            .overall_stats
            .insert("total_rows".to_string(), Value::from(table.num_rows()));
        report
            .overall_stats
            .insert("total_columns".to_string(), Value::from(table.num_columns()));

        let key: Vec<&str> = if table.column("id").is_some() {
            vec!["id"]
        } else {
            Vec::new()
        };
        let duplicates = table.duplicate_count(&key);
        report
            .overall_stats
            .insert("duplicate_rows".to_string(), Value::from(duplicates));
        if duplicates > 0 {
            report
                .data_issues
                .push(format!("{duplicates} duplicate rows detected"));
            report
                .recommendations
                .push("Drop duplicate rows before modeling".to_string());
        }

        for column in table.columns() {
            let mut stats = ColumnStats {
                column: column.name.clone(),
                dtype: column.data.dtype().to_string(),
                null_count: column.data.null_count(),
                unique_count: column.data.unique_count(),
                ..ColumnStats::default()
            };

            if let ColumnData::Utf8(values) = &column.data {
                let empty = values
                    .iter()
                    .filter(|v| v.as_deref() == Some(""))
                    .count();
                stats.empty_count = Some(empty);
                if empty > 0 {
                    report.data_issues.push(format!(
                        "Column {} has {empty} empty values",
                        column.name
                    ));
                    report.recommendations.push(format!(
                        "Fill empty values in {} with a sentinel",
                        column.name
                    ));
                }
            }

            let numeric: Vec<f64> = (0..table.num_rows())
                .filter_map(|idx| column.data.numeric(idx))
                .collect();
            if !numeric.is_empty() {
                stats.min_value = numeric.iter().copied().reduce(f64::min);
                stats.max_value = numeric.iter().copied().reduce(f64::max);

                if let Some((min, max)) = expected_ranges.get(&column.name) {
                    let out = numeric.iter().filter(|v| **v < *min || **v > *max).count();
                    stats.out_of_range_count = Some(out);
                    if out > 0 {
                        report.data_issues.push(format!(
                            "Column {} has {out} values outside [{min}, {max}]",
                            column.name
                        ));
                        report.recommendations.push(format!(
                            "Clip {} to [{min}, {max}]",
                            column.name
                        ));
                    }
                }
            }

            if stats.null_count > 0 {
                report.data_issues.push(format!(
                    "Column {} has {} null values",
                    column.name, stats.null_count
                ));
                report.recommendations.push(format!(
                    "Fill or drop null values in {}",
                    column.name
                ));
            }

            report.column_stats.push(stats);
        }

        report
    }
}

/// Identifier columns are never imputed.
fn is_id_like(name: &str) -> bool {
    name == "id" || name.ends_with("_id")
}
