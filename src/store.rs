//! Catalog store.
//!
//! The extraction output (`catalogs.json`, `files.json`) is loaded into a
//! relational store once. Creation is refused if the store already exists,
//! and the tables and all rows go in as a single unit: either the store is
//! created with every catalog and file, or nothing is left behind.

use chrono::NaiveDateTime;
use postgres::{Client, NoTls};
use std::fs;
use std::path::Path;

use crate::ingest::extract::{CATALOGS_FILE, FILES_FILE};
use crate::logging::{self, DataSource};
use crate::model::{CatalogRecord, DataError, FileRecord, COVERAGE_FORMAT};

pub const SCHEMA_SQL: &str = include_str!("../sql/001_opendap.sql");

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// A file record with its coverage parsed into timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub station_name: String,
    pub location_code: String,
    pub epsg: u32,
    pub lat: f64,
    pub lon: f64,
    pub time_coverage_start: NaiveDateTime,
    pub time_coverage_end: NaiveDateTime,
    pub catalog_id: u64,
}

impl StoredFile {
    pub fn from_record(record: &FileRecord) -> Result<StoredFile, DataError> {
        Ok(StoredFile {
            station_name: record.station_name.clone(),
            location_code: record.location_code.clone(),
            epsg: record.epsg,
            lat: record.lat,
            lon: record.lon,
            time_coverage_start: parse_coverage(&record.time_coverage_start)?,
            time_coverage_end: parse_coverage(&record.time_coverage_end)?,
            catalog_id: record.catalog_id,
        })
    }
}

/// Parses a Waterbase coverage timestamp (`1990-01-01P00:00:00`).
pub fn parse_coverage(text: &str) -> Result<NaiveDateTime, DataError> {
    NaiveDateTime::parse_from_str(text, COVERAGE_FORMAT)
        .map_err(|e| DataError::Parse(format!("bad coverage timestamp '{}': {}", text, e)))
}

/// Reads both dumps from `dir`. Both files must exist.
pub fn load_dumps(dir: &Path) -> Result<(Vec<CatalogRecord>, Vec<StoredFile>), DataError> {
    let catalogs_path = dir.join(CATALOGS_FILE);
    let files_path = dir.join(FILES_FILE);
    for path in [&catalogs_path, &files_path] {
        if !path.is_file() {
            return Err(DataError::NotFound(format!(
                "{} is missing; run extract_catalogs first",
                path.display()
            )));
        }
    }

    let catalogs: Vec<CatalogRecord> = serde_json::from_str(&fs::read_to_string(&catalogs_path)?)?;
    let records: Vec<FileRecord> = serde_json::from_str(&fs::read_to_string(&files_path)?)?;
    let files = records.iter().map(StoredFile::from_record).collect::<Result<Vec<_>, _>>()?;
    Ok((catalogs, files))
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

pub trait CatalogStore {
    fn exists(&mut self) -> Result<bool, DataError>;

    /// Creates the tables and inserts every row as one unit. On failure the
    /// store is left as it was, so creation can simply be retried. Fails
    /// with `DataError::Store` if the tables exist.
    fn create(&mut self, catalogs: &[CatalogRecord], files: &[StoredFile]) -> Result<(), DataError>;
}

/// Creates the store from the dumps in `data_dir`.
/// Returns the number of catalogs and files inserted.
pub fn create_store<S: CatalogStore + ?Sized>(store: &mut S, data_dir: &Path) -> Result<(usize, usize), DataError> {
    if store.exists()? {
        return Err(DataError::Store(
            "catalog store already exists; drop it before recreating".to_string(),
        ));
    }

    let (catalogs, files) = load_dumps(data_dir)?;
    store.create(&catalogs, &files).map_err(|e| {
        logging::log_failure(DataSource::Store, "opendap", "Create", &e);
        e
    })?;

    logging::info(
        DataSource::Store,
        None,
        &format!("Inserted {} catalogs and {} files", catalogs.len(), files.len()),
    );
    Ok((catalogs.len(), files.len()))
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn connect(database_url: &str) -> Result<PostgresStore, DataError> {
        let client = Client::connect(database_url, NoTls)?;
        Ok(PostgresStore { client })
    }
}

impl CatalogStore for PostgresStore {
    fn exists(&mut self) -> Result<bool, DataError> {
        let row = self.client.query_one(
            "SELECT EXISTS (
                 SELECT 1 FROM information_schema.tables
                 WHERE table_schema = 'opendap' AND table_name = 'catalogs'
             )",
            &[],
        )?;
        Ok(row.get(0))
    }

    fn create(&mut self, catalogs: &[CatalogRecord], files: &[StoredFile]) -> Result<(), DataError> {
        if self.exists()? {
            return Err(DataError::Store("schema opendap already has tables".to_string()));
        }

        // DDL is transactional in PostgreSQL; dropping the transaction
        // without commit rolls back the tables along with the rows.
        let mut tx = self.client.transaction()?;
        tx.batch_execute(SCHEMA_SQL)?;

        for catalog in catalogs {
            tx.execute(
                "INSERT INTO opendap.catalogs (pk, id, full_name) VALUES ($1, $2, $3)",
                &[&to_i32(catalog.pk)?, &to_i64(catalog.id)?, &catalog.full_name],
            )?;
        }

        for file in files {
            tx.execute(
                "INSERT INTO opendap.files
                     (station_name, location_code, epsg, lat, lon,
                      time_coverage_start, time_coverage_end, catalog_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &file.station_name,
                    &file.location_code,
                    &to_i32(file.epsg)?,
                    &file.lat,
                    &file.lon,
                    &file.time_coverage_start,
                    &file.time_coverage_end,
                    &to_i64(file.catalog_id)?,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn to_i32(value: u32) -> Result<i32, DataError> {
    i32::try_from(value).map_err(|_| DataError::Store(format!("{} does not fit an INTEGER column", value)))
}

fn to_i64(value: u64) -> Result<i64, DataError> {
    i64::try_from(value).map_err(|_| DataError::Store(format!("{} does not fit a BIGINT column", value)))
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Store kept in memory, with the same key and reference checks as the
/// PostgreSQL tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    created: bool,
    pub catalogs: Vec<CatalogRecord>,
    pub files: Vec<StoredFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl CatalogStore for MemoryStore {
    fn exists(&mut self) -> Result<bool, DataError> {
        Ok(self.created)
    }

    fn create(&mut self, catalogs: &[CatalogRecord], files: &[StoredFile]) -> Result<(), DataError> {
        if self.created {
            return Err(DataError::Store("store already exists".to_string()));
        }

        let mut all_catalogs: Vec<CatalogRecord> = Vec::with_capacity(catalogs.len());
        for catalog in catalogs {
            if all_catalogs.iter().any(|c| c.pk == catalog.pk || c.id == catalog.id) {
                return Err(DataError::Store(format!(
                    "duplicate catalog pk {} / id {}",
                    catalog.pk, catalog.id
                )));
            }
            all_catalogs.push(catalog.clone());
        }
        for file in files {
            if !all_catalogs.iter().any(|c| c.id == file.catalog_id) {
                return Err(DataError::Store(format!(
                    "file {} references unknown catalog {}",
                    file.location_code, file.catalog_id
                )));
            }
        }

        self.created = true;
        self.catalogs = all_catalogs;
        self.files = files.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
