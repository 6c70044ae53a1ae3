//! Structured logging for the Rijkswaterstaat scraper
//!
//! Provides context-rich logging tagged with the data source and the
//! catalog, file or station a message is about. Supports console output
//! and file-based logging for long extraction runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::{DataError, ErrorKind};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// THREDDS catalog pages and OPeNDAP netCDF files.
    Opendap,
    /// Waterinfo JSON/CSV API.
    Waterinfo,
    Store,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Opendap => write!(f, "OPENDAP"),
            DataSource::Waterinfo => write!(f, "WATERINFO"),
            DataSource::Store => write!(f, "STORE"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the upstream server is flaky or the item is gone
    Expected,
    /// Unexpected failure - upstream format changed or configuration is wrong
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: &DataSource, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, subject_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, source: DataSource, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &source, subject, message);
        }
    }
}

pub fn info(source: DataSource, subject: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, subject, message);
}

pub fn warn(source: DataSource, subject: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, subject, message);
}

pub fn error(source: DataSource, subject: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, subject, message);
}

pub fn debug(source: DataSource, subject: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, subject, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a failure by its error family.
///
/// Open failures and 5xx responses are what a loaded THREDDS server
/// produces; parse and format errors mean the upstream format moved.
pub fn classify_failure(err: &DataError) -> FailureType {
    match err {
        DataError::Open(_) => FailureType::Expected,
        DataError::Http(code) if *code >= 500 => FailureType::Expected,
        _ => match err.kind() {
            ErrorKind::Parse | ErrorKind::Format => FailureType::Unexpected,
            ErrorKind::Store | ErrorKind::Io => FailureType::Unexpected,
            ErrorKind::Fetch | ErrorKind::NotFound | ErrorKind::Open => FailureType::Unknown,
        },
    }
}

/// Log a failed operation with automatic classification.
pub fn log_failure(source: DataSource, subject: &str, operation: &str, err: &DataError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(source, Some(subject), &message),
        FailureType::Unexpected => error(source, Some(subject), &message),
        FailureType::Unknown => warn(source, Some(subject), &message),
    }
}

/// Log a netCDF file that was skipped during extraction.
pub fn log_skipped_file(file_url: &str, err: &DataError) {
    warn(
        DataSource::Opendap,
        Some(file_url),
        &format!("Skipping file [{}]: {}", classify_failure(err), err),
    );
}

// ---------------------------------------------------------------------------
// Extraction Summary Logging
// ---------------------------------------------------------------------------

/// Log how many files of a catalog yielded metadata.
pub fn log_extraction_summary(catalog: &str, position: usize, total_catalogs: usize, extracted: usize, listed: usize) {
    let message = format!(
        "Finished with {} ({}/{}). Extracted information from {}/{} files",
        catalog, position, total_catalogs, extracted, listed
    );

    if extracted == listed {
        info(DataSource::Opendap, Some(catalog), &message);
    } else if extracted == 0 {
        error(DataSource::Opendap, Some(catalog), &message);
    } else {
        warn(DataSource::Opendap, Some(catalog), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_failure_classification() {
        let flaky_open = DataError::Open("NetCDF: DAP server error".to_string());
        assert_eq!(classify_failure(&flaky_open), FailureType::Expected);

        assert_eq!(classify_failure(&DataError::Http(503)), FailureType::Expected);
        assert_eq!(classify_failure(&DataError::Http(404)), FailureType::Unknown);

        let changed_page = DataError::Parse("no markup".to_string());
        assert_eq!(classify_failure(&changed_page), FailureType::Unexpected);
    }
}
