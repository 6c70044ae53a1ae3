//! Full Waterbase extraction.
//!
//! Walks every catalog of the archive, reads the metadata of every station
//! file, and writes the two record sets (`catalogs.json`, `files.json`) that
//! the catalog store is created from. Catalogs are processed one after the
//! other and at most one remote file is open at a time.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::ingest::catalog::discover_catalogs;
use crate::ingest::grid::{GridOpener, GridReader};
use crate::ingest::HttpFetch;
use crate::logging::{self, DataSource};
use crate::model::{CatalogRecord, DataError, FileRecord};

pub const CATALOGS_FILE: &str = "catalogs.json";
pub const FILES_FILE: &str = "files.json";

/// A station file whose metadata could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub catalog_id: u64,
    pub file_url: String,
    pub error: DataError,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub catalogs: Vec<CatalogRecord>,
    pub files: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

pub struct Extractor<'a, F: HttpFetch + ?Sized, O: GridOpener> {
    fetch: &'a F,
    reader: &'a GridReader<O>,
    settings: &'a Settings,
}

impl<'a, F: HttpFetch + ?Sized, O: GridOpener> Extractor<'a, F, O> {
    pub fn new(fetch: &'a F, reader: &'a GridReader<O>, settings: &'a Settings) -> Self {
        Extractor {
            fetch,
            reader,
            settings,
        }
    }

    /// Runs the extraction.
    ///
    /// A file that cannot be read (after retries) is logged, recorded in
    /// `skipped` and left out. Failing to list the root or a catalog, or to
    /// derive a catalog's id, aborts the whole run.
    pub fn extract_all(&self) -> Result<Extraction, DataError> {
        let mut catalogs = discover_catalogs(self.fetch, self.settings).map_err(|e| {
            logging::log_failure(DataSource::Opendap, &self.settings.catalog_url, "Root listing", &e);
            e
        })?;
        let total = catalogs.len();
        logging::info(DataSource::Opendap, None, &format!("Found {} catalogs", total));

        let mut extraction = Extraction::default();
        for (index, catalog) in catalogs.iter_mut().enumerate() {
            let name = catalog.listing_name().to_string();
            logging::info(
                DataSource::Opendap,
                Some(&name),
                &format!("Processing {}/{}", index + 1, total),
            );

            let files = match catalog.resolve_files(self.fetch, self.settings) {
                Ok(files) => files.to_vec(),
                Err(e) => {
                    logging::log_failure(DataSource::Opendap, &name, "Catalog listing", &e);
                    return Err(e);
                }
            };
            let record = catalog
                .record()
                .ok_or_else(|| DataError::NotFound(format!("catalog {} has no id", name)))?;

            let mut extracted = 0;
            for file_name in &files {
                let url = catalog.file_url(self.settings, file_name);
                match self.reader.read_meta(&url) {
                    Ok(meta) => {
                        extraction.files.push(FileRecord::from_meta(meta, record.id));
                        extracted += 1;
                    }
                    Err(error) => {
                        logging::log_skipped_file(&url, &error);
                        extraction.skipped.push(SkippedFile {
                            catalog_id: record.id,
                            file_url: url,
                            error,
                        });
                    }
                }
            }

            logging::log_extraction_summary(&name, index + 1, total, extracted, files.len());
            extraction.catalogs.push(record);
        }

        Ok(extraction)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Writes `catalogs.json` and `files.json` into `dir`, creating it if needed.
pub fn write_outputs(extraction: &Extraction, dir: &Path) -> Result<(PathBuf, PathBuf), DataError> {
    fs::create_dir_all(dir)?;

    let catalogs_path = dir.join(CATALOGS_FILE);
    fs::write(&catalogs_path, to_indented_json(&extraction.catalogs)?)?;

    let files_path = dir.join(FILES_FILE);
    fs::write(&files_path, to_indented_json(&extraction.files)?)?;

    logging::info(
        DataSource::System,
        None,
        &format!(
            "Wrote {} catalogs to {} and {} files to {}",
            extraction.catalogs.len(),
            catalogs_path.display(),
            extraction.files.len(),
            files_path.display()
        ),
    );
    Ok((catalogs_path, files_path))
}

fn to_indented_json<T: Serialize>(value: &T) -> Result<Vec<u8>, DataError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
