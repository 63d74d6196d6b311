// src/config.rs

//! Application configuration structures.
//!
//! Loaded from a TOML file; every field has a serde default so a partial
//! config (or none at all) still yields a working setup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// ESPN API access settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Data layout on disk
    #[serde(default)]
    pub storage: StorageConfig,

    /// Season collection window
    #[serde(default)]
    pub collection: CollectionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Point all storage paths at a different base directory.
    pub fn data_dir_override(&mut self, data_dir: &Path) {
        self.storage.data_dir = data_dir.to_path_buf();
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::validation("api.base_url is empty"));
        }
        if self.api.rate_limit <= 0.0 {
            return Err(AppError::validation("api.rate_limit must be > 0"));
        }
        if self.api.burst < 1 {
            return Err(AppError::validation("api.burst must be >= 1"));
        }
        if self.api.max_retries == 0 {
            return Err(AppError::validation("api.max_retries must be > 0"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.page_limit == 0 {
            return Err(AppError::validation("api.page_limit must be > 0"));
        }
        Ok(())
    }
}

/// ESPN API access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for the site API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Base URL for the v3 athlete API
    #[serde(default = "defaults::v3_base_url")]
    pub v3_base_url: String,

    /// Requests per second allowed against the API
    #[serde(default = "defaults::rate_limit")]
    pub rate_limit: f64,

    /// Maximum burst of requests allowed at once
    #[serde(default = "defaults::burst")]
    pub burst: u32,

    /// Total attempts per request (first try included)
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Multiplicative factor for exponential backoff
    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,

    /// Random jitter fraction applied to backoff delays
    #[serde(default = "defaults::jitter")]
    pub jitter: f64,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// ESPN groups parameter (50 = Division I)
    #[serde(default = "defaults::groups")]
    pub groups: String,

    /// Page size for paginated endpoints
    #[serde(default = "defaults::page_limit")]
    pub page_limit: usize,

    /// Dump every raw API response under the temp directory
    #[serde(default)]
    pub debug_responses: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            v3_base_url: defaults::v3_base_url(),
            rate_limit: defaults::rate_limit(),
            burst: defaults::burst(),
            max_retries: defaults::max_retries(),
            backoff_factor: defaults::backoff_factor(),
            jitter: defaults::jitter(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            groups: defaults::groups(),
            page_limit: defaults::page_limit(),
            debug_responses: false,
        }
    }
}

/// Data layout on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all collected data
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Bronze-layer raw partitions, relative to `data_dir`
    #[serde(default = "defaults::raw_subdir")]
    pub raw_subdir: String,

    /// Per-season consolidated files, relative to `data_dir`
    #[serde(default = "defaults::seasons_subdir")]
    pub seasons_subdir: String,

    /// Cleaned silver-layer output, relative to `data_dir`
    #[serde(default = "defaults::cleaned_subdir")]
    pub cleaned_subdir: String,

    /// Progress and quality reports, relative to `data_dir`
    #[serde(default = "defaults::reports_subdir")]
    pub reports_subdir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            raw_subdir: defaults::raw_subdir(),
            seasons_subdir: defaults::seasons_subdir(),
            cleaned_subdir: defaults::cleaned_subdir(),
            reports_subdir: defaults::reports_subdir(),
        }
    }
}

impl StorageConfig {
    /// Directory holding the bronze-layer raw partitions.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join(&self.raw_subdir)
    }

    /// Directory holding per-season consolidated files.
    pub fn seasons_dir(&self) -> PathBuf {
        self.data_dir.join(&self.seasons_subdir)
    }

    /// Directory holding cleaned output.
    pub fn cleaned_dir(&self) -> PathBuf {
        self.data_dir.join(&self.cleaned_subdir)
    }

    /// Directory holding reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join(&self.reports_subdir)
    }
}

/// Season collection window.
///
/// NCAA basketball seasons run from November of the preceding calendar year
/// to mid-April of the season year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Season start month (in the preceding calendar year)
    #[serde(default = "defaults::season_start_month")]
    pub season_start_month: u32,

    /// Season start day of month
    #[serde(default = "defaults::season_start_day")]
    pub season_start_day: u32,

    /// Season end month (in the season year)
    #[serde(default = "defaults::season_end_month")]
    pub season_end_month: u32,

    /// Season end day of month
    #[serde(default = "defaults::season_end_day")]
    pub season_end_day: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            season_start_month: defaults::season_start_month(),
            season_start_day: defaults::season_start_day(),
            season_end_month: defaults::season_end_month(),
            season_end_day: defaults::season_end_day(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn base_url() -> String {
        "https://site.api.espn.com/apis/site/v2/sports/basketball/mens-college-basketball".into()
    }
    pub fn v3_base_url() -> String {
        "https://site.api.espn.com/v3/sports/basketball/mens-college-basketball".into()
    }
    pub fn rate_limit() -> f64 {
        5.0
    }
    pub fn burst() -> u32 {
        10
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_factor() -> f64 {
        2.0
    }
    pub fn jitter() -> f64 {
        0.2
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; courtside/0.1)".into()
    }
    pub fn groups() -> String {
        "50".into()
    }
    pub fn page_limit() -> usize {
        100
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn raw_subdir() -> String {
        "raw".into()
    }
    pub fn seasons_subdir() -> String {
        "seasons".into()
    }
    pub fn cleaned_subdir() -> String {
        "cleaned".into()
    }
    pub fn reports_subdir() -> String {
        "reports".into()
    }

    // Collection window defaults
    pub fn season_start_month() -> u32 {
        11
    }
    pub fn season_start_day() -> u32 {
        1
    }
    pub fn season_end_month() -> u32 {
        4
    }
    pub fn season_end_day() -> u32 {
        15
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.api.base_url.contains("mens-college-basketball"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            rate_limit = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.api.rate_limit, 2.5);
        assert_eq!(config.api.burst, 10);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let mut config = Config::default();
        config.api.rate_limit = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_paths() {
        let config = StorageConfig::default();
        assert_eq!(config.raw_dir(), PathBuf::from("data/raw"));
        assert_eq!(config.seasons_dir(), PathBuf::from("data/seasons"));
    }
}
