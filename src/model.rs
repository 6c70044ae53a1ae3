//! Core data types for the Rijkswaterstaat scraper.
//!
//! This module defines the shared domain model imported by all other modules:
//! catalog and file records produced by the Waterbase extraction, stations
//! returned by the Waterinfo API, decoded measurement series, and the error
//! type every fallible operation returns.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// EPSG code of the coordinates stored in Waterbase netCDF files.
pub const WATERBASE_EPSG: u32 = 4326;

/// Format of `time_coverage_start` / `time_coverage_end` in the JSON dumps.
pub const COVERAGE_FORMAT: &str = "%Y-%m-%dP%H:%M:%S";

// ---------------------------------------------------------------------------
// Waterbase records
// ---------------------------------------------------------------------------

/// Station metadata as read from a netCDF file's global attributes.
///
/// Values are copied verbatim; nothing is computed or validated here.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMeta {
    pub station_name: String,
    pub location_code: String,
    pub lat: f64,
    pub lon: f64,
    pub time_coverage_start: String,
    pub time_coverage_end: String,
}

/// One entry of `catalogs.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub pk: u32,
    pub full_name: String,
    pub id: u64,
}

/// One entry of `files.json`, tagged with the id of its parent catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub station_name: String,
    pub location_code: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_epsg")]
    pub epsg: u32,
    pub time_coverage_start: String,
    pub time_coverage_end: String,
    pub catalog_id: u64,
}

fn default_epsg() -> u32 {
    WATERBASE_EPSG
}

impl FileRecord {
    pub fn from_meta(meta: StationMeta, catalog_id: u64) -> Self {
        FileRecord {
            station_name: meta.station_name,
            location_code: meta.location_code,
            lat: meta.lat,
            lon: meta.lon,
            epsg: WATERBASE_EPSG,
            time_coverage_start: meta.time_coverage_start,
            time_coverage_end: meta.time_coverage_end,
            catalog_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Waterinfo stations
// ---------------------------------------------------------------------------

/// A measurement station from the Waterinfo latest-measurements endpoint.
///
/// `coordinates` is `(x, y)` in the order GeoJSON uses: longitude/easting
/// first. `crs` is always a lowercase `epsg:NNNN` label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
    #[serde(rename = "locationCode")]
    pub location_code: String,
    pub coordinates: (f64, f64),
    pub crs: String,
    /// Expert parameter slug of the first measurement the station reports.
    pub expert_parameter: Option<String>,
}

impl Station {
    /// Case-insensitive match against the station name or location code.
    pub fn matches(&self, name_or_code: &str) -> bool {
        let wanted = name_or_code.to_lowercase();
        self.name.to_lowercase() == wanted || self.location_code.to_lowercase() == wanted
    }
}

// ---------------------------------------------------------------------------
// Measurement series
// ---------------------------------------------------------------------------

/// An insertion-ordered time series with at most one value per timestamp.
///
/// Order is whatever the source returned; the series is never re-sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    pub name: String,
    points: Vec<(DateTime<Utc>, f64)>,
    seen: HashSet<DateTime<Utc>>,
}

impl MeasurementSeries {
    pub fn new(name: &str) -> Self {
        MeasurementSeries {
            name: name.to_string(),
            points: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Appends a point. Returns `false` (and leaves the series unchanged)
    /// if the timestamp is already present.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) -> bool {
        if !self.seen.insert(timestamp) {
            return false;
        }
        self.points.push((timestamp, value));
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(DateTime<Utc>, f64)] {
        &self.points
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        if !self.seen.contains(&timestamp) {
            return None;
        }
        self.points
            .iter()
            .find(|(t, _)| *t == timestamp)
            .map(|(_, v)| *v)
    }

    pub fn first(&self) -> Option<(DateTime<Utc>, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(DateTime<Utc>, f64)> {
        self.points.last().copied()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Coarse classification of a `DataError`, used for logging and for callers
/// that only care about the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Parse,
    NotFound,
    Format,
    Open,
    Store,
    Io,
}

/// Errors that can arise when scraping, reading or storing Rijkswaterstaat data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// Non-2xx HTTP response.
    Http(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    Fetch(String),
    /// A page or response body had an unexpected shape.
    Parse(String),
    /// Unknown measurement type, unknown station, or missing catalog id.
    NotFound(String),
    /// Malformed delimited time-series text. `line` is 1-based.
    Format { line: usize, message: String },
    /// A remote grid file could not be opened. Retried by the grid reader.
    Open(String),
    /// The catalog store refused or failed an operation.
    Store(String),
    /// Local file system failure.
    Io(String),
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Http(_) | DataError::Fetch(_) => ErrorKind::Fetch,
            DataError::Parse(_) => ErrorKind::Parse,
            DataError::NotFound(_) => ErrorKind::NotFound,
            DataError::Format { .. } => ErrorKind::Format,
            DataError::Open(_) => ErrorKind::Open,
            DataError::Store(_) => ErrorKind::Store,
            DataError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        DataError::Format {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Http(code) => write!(f, "HTTP error: {}", code),
            DataError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            DataError::Parse(msg) => write!(f, "Parse error: {}", msg),
            DataError::NotFound(what) => write!(f, "Not found: {}", what),
            DataError::Format { line, message } => {
                write!(f, "Format error on line {}: {}", line, message)
            }
            DataError::Open(msg) => write!(f, "Open error: {}", msg),
            DataError::Store(msg) => write!(f, "Store error: {}", msg),
            DataError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DataError {}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DataError::Http(status.as_u16()),
            None => DataError::Fetch(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<postgres::Error> for DataError {
    fn from(err: postgres::Error) -> Self {
        DataError::Store(err.to_string())
    }
}

impl From<toml::de::Error> for DataError {
    fn from(err: toml::de::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
