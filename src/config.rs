//! Runtime settings.
//!
//! Endpoints, output locations and retry limits are read from
//! `rijkswaterstaat.toml` (or the file named by `RWS_CONFIG`) so they can be
//! changed without recompiling. Every field has a default matching the public
//! Rijkswaterstaat services, so a missing file is not an error.
//!
//! `DATABASE_URL` is read from the environment (after loading `.env`).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging::LogLevel;
use crate::model::DataError;

pub const DEFAULT_CONFIG_PATH: &str = "rijkswaterstaat.toml";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// THREDDS catalog root (HTML listings).
    pub catalog_url: String,
    /// OPeNDAP root the netCDF files are opened from.
    pub data_url: String,
    /// Waterinfo latest-measurements endpoint.
    pub latest_measurements_url: String,
    /// Waterinfo CSV download endpoint.
    pub download_csv_url: String,
    /// Waterinfo download groups endpoint.
    pub download_groups_url: String,
    /// Time zone the Waterbase timestamps are expressed in.
    pub timezone: String,
    /// Extra attempts after a failed open of a remote netCDF file.
    pub open_retries: u32,
    /// Where `catalogs.json` and `files.json` are written.
    pub data_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_url: "http://opendap.deltares.nl/thredds/catalog/opendap/rijkswaterstaat/waterbase"
                .to_string(),
            data_url: "http://opendap.deltares.nl/thredds/dodsC/opendap/rijkswaterstaat/waterbase"
                .to_string(),
            latest_measurements_url: "https://waterinfo.rws.nl/api/point/latestmeasurements"
                .to_string(),
            download_csv_url: "http://waterinfo.rws.nl/api/Download/CSV".to_string(),
            download_groups_url: "https://waterinfo.rws.nl/api/nav/downloadgroups".to_string(),
            timezone: "MET".to_string(),
            open_retries: 3,
            data_dir: PathBuf::from("data"),
            http_timeout_secs: 30,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Loads settings from `RWS_CONFIG` or `rijkswaterstaat.toml`, falling
    /// back to defaults if the file does not exist.
    pub fn load() -> Result<Settings, DataError> {
        dotenv::dotenv().ok();
        let path = std::env::var("RWS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        if !path.exists() {
            return Ok(Settings::default());
        }
        Settings::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Settings, DataError> {
        let content = fs::read_to_string(path)
            .map_err(|e| DataError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Settings::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Settings, DataError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.catalog_url = trim_base(&settings.catalog_url);
        settings.data_url = trim_base(&settings.data_url);
        Ok(settings)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Parsed log level; unknown names fall back to `Info`.
    pub fn min_log_level(&self) -> LogLevel {
        match self.log_level.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// Blocking HTTP client configured with the request timeout.
    pub fn http_client(&self) -> Result<reqwest::blocking::Client, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.http_timeout())
            .build()?;
        Ok(client)
    }
}

/// Connection string for the catalog store, from the environment.
pub fn database_url() -> Result<String, DataError> {
    dotenv::dotenv().ok();
    std::env::var("DATABASE_URL")
        .map_err(|_| DataError::Store("DATABASE_URL is not set (check .env)".to_string()))
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
