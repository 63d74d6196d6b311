// src/storage/parquet.rs

//! Bronze-layer raw storage as partitioned parquet files.
//!
//! One logical row per fetch: the raw JSON payload plus provenance columns
//! (`source_url`, request parameters, content hash, created_at). Scoreboard
//! data partitions by `year={Y}/month={M}`; the team list is a single
//! unpartitioned file. Rewrites are always read-merge-rename: a crash
//! mid-write can never corrupt existing data.
//!
//! ## Layout
//!
//! ```text
//! {base}/
//! ├── scoreboard/
//! │   └── year=2023/
//! │       └── month=03/
//! │           └── data.parquet
//! └── teams/
//!     └── data.parquet
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::storage::table::{Column, Table};
use crate::utils::dates::format_partition_date;

/// Rows per batch when the fallback ladder reaches incremental writing.
const WRITE_BATCH_SIZE: usize = 500;

/// Outcome of a raw write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Final file path of the partition
    pub file_path: PathBuf,
    /// The stored content hash already matched; nothing was written
    pub unchanged: bool,
}

/// How much history a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Only the most recently created matching record
    Latest,
    /// Every historical record for the key
    All,
}

/// A raw API response ready for bronze storage.
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Request URL the data came from
    pub source_url: String,
    /// Request parameters, serialized to JSON for the `parameters` column
    pub parameters: Value,
    /// The raw response body
    pub raw_data: String,
    /// Overwrite without comparing content hashes
    pub force_overwrite: bool,
}

impl RawPayload {
    /// Build a payload from a JSON response value.
    pub fn from_value(source_url: impl Into<String>, parameters: Value, data: &Value) -> Self {
        Self {
            source_url: source_url.into(),
            parameters,
            raw_data: data.to_string(),
            force_overwrite: false,
        }
    }

    /// sha256 of the raw payload, hex encoded.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.raw_data.as_bytes()))
    }
}

/// Partitioned parquet store for raw API responses.
#[derive(Debug, Clone)]
pub struct ParquetStorage {
    base_dir: PathBuf,
}

impl ParquetStorage {
    /// Create a store rooted at the given directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn scoreboard_partition(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join("scoreboard")
            .join(format!("year={}", date.format("%Y")))
            .join(format!("month={}", date.format("%m")))
            .join("data.parquet")
    }

    fn teams_file(&self) -> PathBuf {
        self.base_dir.join("teams").join("data.parquet")
    }

    /// Write one date's scoreboard response into its year/month partition.
    ///
    /// At most one row exists per (partition, date): a matching content hash
    /// short-circuits (`unchanged`), a differing or empty stored hash
    /// replaces the row, a new date appends.
    pub async fn write_scoreboard(&self, date: NaiveDate, payload: RawPayload) -> Result<WriteOutcome> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write_scoreboard_sync(date, &payload))
            .await
            .map_err(|e| AppError::collection("scoreboard write task", e))?
    }

    fn write_scoreboard_sync(&self, date: NaiveDate, payload: &RawPayload) -> Result<WriteOutcome> {
        let path = self.scoreboard_partition(date);
        let date_str = format_partition_date(date);
        let row = scoreboard_row(&date_str, date, payload);
        self.merge_row(&path, "date", &date_str, row, payload)
    }

    /// Write the team list response into the single teams file, keyed by the
    /// request parameter tuple.
    pub async fn write_teams(&self, payload: RawPayload) -> Result<WriteOutcome> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write_teams_sync(&payload))
            .await
            .map_err(|e| AppError::collection("teams write task", e))?
    }

    fn write_teams_sync(&self, payload: &RawPayload) -> Result<WriteOutcome> {
        let path = self.teams_file();
        let params_json = payload.parameters.to_string();
        let row = teams_row(&params_json, payload);
        self.merge_row(&path, "parameters", &params_json, row, payload)
    }

    /// Read-merge-rewrite one keyed row into a partition file.
    fn merge_row(
        &self,
        path: &Path,
        key_column: &str,
        key: &str,
        row: Table,
        payload: &RawPayload,
    ) -> Result<WriteOutcome> {
        let existing = if path.exists() {
            match read_table_file(path) {
                Ok(table) => Some(table),
                Err(e) => {
                    // A corrupted partition is as good as absent; start over
                    // rather than propagating the corruption.
                    log::error!(
                        "Error reading existing partition {}, recreating: {e}",
                        path.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        let merged = match existing {
            None => row,
            Some(existing) => match existing.find_row(key_column, key) {
                None => Table::concat(&[&existing, &row])?,
                Some(idx) => {
                    if !payload.force_overwrite {
                        let stored_hash = existing
                            .utf8_values("content_hash")
                            .and_then(|v| v[idx].clone())
                            .unwrap_or_default();
                        if !stored_hash.is_empty() && stored_hash == payload.content_hash() {
                            log::info!("Content hash unchanged for {key}, skipping update");
                            return Ok(WriteOutcome {
                                file_path: path.to_path_buf(),
                                unchanged: true,
                            });
                        }
                    }
                    log::info!("Content changed for {key}, replacing stored row");
                    let without = existing.retain_rows(|i| i != idx);
                    Table::concat(&[&without, &row])?
                }
            },
        };

        write_table_file(&merged, path)?;
        Ok(WriteOutcome {
            file_path: path.to_path_buf(),
            unchanged: false,
        })
    }

    /// Read raw scoreboard payloads for a date.
    ///
    /// `Latest` returns at most one payload (most recent `created_at`);
    /// `All` returns the full ingestion history for the date.
    pub async fn read_scoreboard(&self, date: NaiveDate, mode: ReadMode) -> Result<Vec<String>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_scoreboard_sync(date, mode))
            .await
            .map_err(|e| AppError::collection("scoreboard read task", e))?
    }

    fn read_scoreboard_sync(&self, date: NaiveDate, mode: ReadMode) -> Result<Vec<String>> {
        let path = self.scoreboard_partition(date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let table = read_table_file(&path)?;
        let date_str = format_partition_date(date);
        let dates = table.utf8_values("date").unwrap_or(&[]).to_vec();
        let raw = table.utf8_values("raw_data").unwrap_or(&[]).to_vec();
        let created = table.utf8_values("created_at").unwrap_or(&[]).to_vec();

        let mut matches: Vec<(String, String)> = dates
            .iter()
            .enumerate()
            .filter(|(_, d)| d.as_deref() == Some(date_str.as_str()))
            .filter_map(|(i, _)| {
                let data = raw.get(i)?.clone()?;
                let at = created.get(i).cloned().flatten().unwrap_or_default();
                Some((at, data))
            })
            .collect();

        matches.sort_by(|a, b| b.0.cmp(&a.0));
        let payloads: Vec<String> = matches.into_iter().map(|(_, data)| data).collect();
        Ok(match mode {
            ReadMode::Latest => payloads.into_iter().take(1).collect(),
            ReadMode::All => payloads,
        })
    }

    /// All dates with stored scoreboard data, sorted.
    pub async fn processed_dates(&self) -> Result<Vec<String>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.processed_dates_sync())
            .await
            .map_err(|e| AppError::collection("processed dates task", e))?
    }

    fn processed_dates_sync(&self) -> Result<Vec<String>> {
        let scoreboard_dir = self.base_dir.join("scoreboard");
        if !scoreboard_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = std::collections::BTreeSet::new();
        for year_dir in partition_dirs(&scoreboard_dir, "year=")? {
            for month_dir in partition_dirs(&year_dir, "month=")? {
                let file = month_dir.join("data.parquet");
                if !file.exists() {
                    continue;
                }
                match read_table_file(&file) {
                    Ok(table) => {
                        for date in table.utf8_values("date").unwrap_or(&[]).iter().flatten() {
                            dates.insert(date.clone());
                        }
                    }
                    Err(e) => {
                        log::error!("Error reading partition {}: {e}", file.display());
                    }
                }
            }
        }
        Ok(dates.into_iter().collect())
    }

    /// Whether a single date already has stored data. Cheaper than listing
    /// every processed date when only one partition has to be opened.
    pub async fn is_date_processed(&self, date: NaiveDate) -> bool {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.is_date_processed_sync(date))
            .await
            .unwrap_or(false)
    }

    fn is_date_processed_sync(&self, date: NaiveDate) -> bool {
        let path = self.scoreboard_partition(date);
        if !path.exists() {
            return false;
        }
        match read_table_file(&path) {
            Ok(table) => table
                .find_row("date", &format_partition_date(date))
                .is_some(),
            Err(e) => {
                log::error!("Error checking partition {}: {e}", path.display());
                false
            }
        }
    }

    /// Endpoint directories present under the store root.
    pub fn list_endpoints(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut endpoints: Vec<String> = fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        endpoints.sort();
        Ok(endpoints)
    }
}

fn partition_dirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn scoreboard_row(date_str: &str, date: NaiveDate, payload: &RawPayload) -> Table {
    let base = raw_columns(payload);
    let mut columns = vec![Column::utf8("date", vec![Some(date_str.to_string())])];
    columns.extend(base);
    columns.push(Column::utf8(
        "year",
        vec![Some(date.format("%Y").to_string())],
    ));
    columns.push(Column::utf8(
        "month",
        vec![Some(date.format("%m").to_string())],
    ));
    Table::from_columns(columns).expect("single-row columns agree on length")
}

fn teams_row(params_json: &str, payload: &RawPayload) -> Table {
    // The parameters column doubles as the natural key for teams data, so it
    // leads the schema the way `date` does for scoreboard partitions.
    let mut columns = vec![Column::utf8(
        "parameters",
        vec![Some(params_json.to_string())],
    )];
    for column in raw_columns(payload) {
        if column.name != "parameters" {
            columns.push(column);
        }
    }
    Table::from_columns(columns).expect("single-row columns agree on length")
}

fn raw_columns(payload: &RawPayload) -> Vec<Column> {
    vec![
        Column::utf8("source_url", vec![Some(payload.source_url.clone())]),
        Column::utf8(
            "parameters",
            vec![Some(payload.parameters.to_string())],
        ),
        Column::utf8("content_hash", vec![Some(payload.content_hash())]),
        Column::utf8("raw_data", vec![Some(payload.raw_data.clone())]),
        Column::utf8("created_at", vec![Some(Utc::now().to_rfc3339())]),
    ]
}

/// Write a table to a parquet file atomically.
///
/// The data lands in a temp file in the target directory first and is
/// renamed into place, so readers never observe a partial file. Write
/// strategies fall back in order: zstd compression, no compression, then
/// incremental fixed-size row batches (for pathological rows that break
/// single-shot encoding). Exhausting the ladder is a `StorageWriteError`.
pub fn write_table_file(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let batch = table.to_record_batch()?;
    let tmp = path.with_extension("parquet.tmp");

    let zstd = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();
    let result = write_batch_file(&tmp, &batch, zstd, None)
        .or_else(|e| {
            log::warn!(
                "Compressed write failed for {} ({e}), retrying without compression",
                path.display()
            );
            let plain = WriterProperties::builder()
                .set_compression(Compression::UNCOMPRESSED)
                .build();
            write_batch_file(&tmp, &batch, plain, None)
        })
        .or_else(|e| {
            log::warn!(
                "Uncompressed write failed for {} ({e}), retrying in batch mode",
                path.display()
            );
            let batched = WriterProperties::builder()
                .set_compression(Compression::UNCOMPRESSED)
                .set_max_row_group_size(WRITE_BATCH_SIZE)
                .build();
            write_batch_file(&tmp, &batch, batched, Some(WRITE_BATCH_SIZE))
        });

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(AppError::storage_write(path, e));
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_batch_file(
    tmp: &Path,
    batch: &arrow_array::RecordBatch,
    props: WriterProperties,
    batch_size: Option<usize>,
) -> Result<()> {
    let file = fs::File::create(tmp)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;

    match batch_size {
        None => writer.write(batch)?,
        Some(size) => {
            let mut offset = 0;
            while offset < batch.num_rows() {
                let len = size.min(batch.num_rows() - offset);
                writer.write(&batch.slice(offset, len))?;
                offset += len;
            }
        }
    }

    writer.close()?;
    Ok(())
}

/// Read a parquet file into a table, concatenating all record batches.
pub fn read_table_file(path: &Path) -> Result<Table> {
    let file = fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut tables = Vec::new();
    for batch in reader {
        tables.push(Table::from_record_batch(&batch?)?);
    }
    if tables.is_empty() {
        return Ok(Table::new());
    }
    let refs: Vec<&Table> = tables.iter().collect();
    Table::concat(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(data: &str) -> RawPayload {
        RawPayload {
            source_url: "https://example.com/scoreboard".to_string(),
            parameters: serde_json::json!({"dates": "20230301", "groups": "50"}),
            raw_data: data.to_string(),
            force_overwrite: false,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        let outcome = storage
            .write_scoreboard(date(), payload(r#"{"events":[]}"#))
            .await
            .unwrap();
        assert!(!outcome.unchanged);
        assert!(outcome.file_path.exists());

        let latest = storage
            .read_scoreboard(date(), ReadMode::Latest)
            .await
            .unwrap();
        assert_eq!(latest, vec![r#"{"events":[]}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_idempotent_write_reports_unchanged() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        let first = storage
            .write_scoreboard(date(), payload(r#"{"events":[]}"#))
            .await
            .unwrap();
        assert!(!first.unchanged);

        let second = storage
            .write_scoreboard(date(), payload(r#"{"events":[]}"#))
            .await
            .unwrap();
        assert!(second.unchanged);

        // Still exactly one stored record.
        let all = storage.read_scoreboard(date(), ReadMode::All).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_content_replaces_row() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        storage
            .write_scoreboard(date(), payload(r#"{"events":[]}"#))
            .await
            .unwrap();
        let outcome = storage
            .write_scoreboard(date(), payload(r#"{"events":[{"id":"1"}]}"#))
            .await
            .unwrap();
        assert!(!outcome.unchanged);

        let all = storage.read_scoreboard(date(), ReadMode::All).await.unwrap();
        assert_eq!(all, vec![r#"{"events":[{"id":"1"}]}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_second_date_appends_to_partition() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        storage
            .write_scoreboard(date(), payload(r#"{"a":1}"#))
            .await
            .unwrap();
        let other = NaiveDate::from_ymd_opt(2023, 3, 2).unwrap();
        storage
            .write_scoreboard(other, payload(r#"{"b":2}"#))
            .await
            .unwrap();

        // Same partition file holds both dates.
        let table = read_table_file(&storage.scoreboard_partition(date())).unwrap();
        assert_eq!(table.num_rows(), 2);

        let dates = storage.processed_dates().await.unwrap();
        assert_eq!(dates, vec!["2023-03-01", "2023-03-02"]);
    }

    #[tokio::test]
    async fn test_force_overwrite_skips_hash_check() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        storage
            .write_scoreboard(date(), payload(r#"{"events":[]}"#))
            .await
            .unwrap();
        let mut forced = payload(r#"{"events":[]}"#);
        forced.force_overwrite = true;
        let outcome = storage.write_scoreboard(date(), forced).await.unwrap();
        assert!(!outcome.unchanged);
    }

    #[tokio::test]
    async fn test_corrupted_partition_is_recreated() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        let path = storage.scoreboard_partition(date());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not parquet at all").unwrap();

        let outcome = storage
            .write_scoreboard(date(), payload(r#"{"fresh":true}"#))
            .await
            .unwrap();
        assert!(!outcome.unchanged);

        let latest = storage
            .read_scoreboard(date(), ReadMode::Latest)
            .await
            .unwrap();
        assert_eq!(latest, vec![r#"{"fresh":true}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_teams_dedup_by_parameters() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        let teams = RawPayload {
            source_url: "https://example.com/teams".to_string(),
            parameters: serde_json::json!({"page": 1}),
            raw_data: r#"{"sports":[]}"#.to_string(),
            force_overwrite: false,
        };
        let first = storage.write_teams(teams.clone()).await.unwrap();
        assert!(!first.unchanged);
        let second = storage.write_teams(teams.clone()).await.unwrap();
        assert!(second.unchanged);

        // A different parameter tuple is a new row, not a replacement.
        let mut page2 = teams;
        page2.parameters = serde_json::json!({"page": 2});
        storage.write_teams(page2).await.unwrap();
        let table = read_table_file(&storage.teams_file()).unwrap();
        assert_eq!(table.num_rows(), 2);
    }

    #[tokio::test]
    async fn test_is_date_processed() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());

        assert!(!storage.is_date_processed(date()).await);
        storage
            .write_scoreboard(date(), payload(r#"{}"#))
            .await
            .unwrap();
        assert!(storage.is_date_processed(date()).await);

        let other = NaiveDate::from_ymd_opt(2023, 3, 9).unwrap();
        assert!(!storage.is_date_processed(other).await);
    }

    #[test]
    fn test_list_endpoints() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage::new(tmp.path());
        assert!(storage.list_endpoints().unwrap().is_empty());

        fs::create_dir_all(tmp.path().join("scoreboard")).unwrap();
        fs::create_dir_all(tmp.path().join("teams")).unwrap();
        assert_eq!(storage.list_endpoints().unwrap(), vec!["scoreboard", "teams"]);
    }
}
