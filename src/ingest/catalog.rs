//! Waterbase catalogs.
//!
//! The Waterbase archive is a two-level THREDDS tree: one sub-catalog per
//! measured quantity (`22_Waterhoogte_in_cm_t.o.v._normaal_amsterdams_peil_in_oppervlaktewater`)
//! holding one netCDF file per station (`id22-HOEKVHLD.nc`). The numeric id
//! in the file names is the catalog's measurement id; it is only known once
//! the file list has been fetched.

use regex::Regex;
use std::cell::OnceCell;
use std::sync::LazyLock;

use crate::config::Settings;
use crate::ingest::grid::{GridOpener, GridReader};
use crate::ingest::thredds::list_entries;
use crate::ingest::HttpFetch;
use crate::logging::{self, DataSource};
use crate::model::{CatalogRecord, DataError};

static LISTING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)_(.*)$").expect("listing name pattern should be valid"));
static FILE_CATALOG_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^id(\d+)-").expect("file id pattern should be valid"));
static FILE_STATION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^id\d+-(.*)\.nc$").expect("station code pattern should be valid"));

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FileList {
    Unresolved,
    Resolved(Vec<String>),
}

impl FileList {
    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            FileList::Unresolved => None,
            FileList::Resolved(files) => Some(files),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    listing_name: String,
    pk: u32,
    display_name: String,
    id: Option<u64>,
    files: FileList,
}

impl Catalog {
    /// Builds a catalog from its listing name, `<pk>_<display name>`.
    pub fn from_listing_name(name: &str) -> Result<Catalog, DataError> {
        let caps = LISTING_NAME
            .captures(name)
            .ok_or_else(|| DataError::Parse(format!("'{}' is not a catalog listing name", name)))?;
        let pk = caps[1]
            .parse()
            .map_err(|_| DataError::Parse(format!("catalog number in '{}' is out of range", name)))?;

        Ok(Catalog {
            listing_name: name.to_string(),
            pk,
            display_name: caps[2].to_string(),
            id: None,
            files: FileList::Unresolved,
        })
    }

    pub fn listing_name(&self) -> &str {
        &self.listing_name
    }

    pub fn pk(&self) -> u32 {
        self.pk
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Measurement id, known after [`Catalog::resolve_files`] succeeded.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// OPeNDAP directory holding the catalog's files, with trailing slash.
    pub fn data_url(&self, settings: &Settings) -> String {
        format!("{}/{}/nc/", settings.data_url, self.listing_name)
    }

    pub fn catalog_page_url(&self, settings: &Settings) -> String {
        format!("{}/{}/nc/catalog.html", settings.catalog_url, self.listing_name)
    }

    pub fn file_url(&self, settings: &Settings, file_name: &str) -> String {
        format!("{}{}", self.data_url(settings), file_name)
    }

    /// Fetches the file list on first use; later calls return the cached list.
    ///
    /// Only `.nc` entries count as files. On success the catalog id is taken
    /// from the first file. A listing without files, or a first file without
    /// an `id<digits>-` prefix, is `DataError::NotFound` and leaves the
    /// catalog unresolved.
    pub fn resolve_files<F: HttpFetch + ?Sized>(
        &mut self,
        fetch: &F,
        settings: &Settings,
    ) -> Result<&[String], DataError> {
        if self.files == FileList::Unresolved {
            let mut files = list_entries(fetch, &self.catalog_page_url(settings))?;
            files.retain(|name| name.ends_with(".nc"));
            let first = files.first().ok_or_else(|| {
                DataError::NotFound(format!("catalog {} lists no files", self.listing_name))
            })?;
            let id = catalog_id_from_file_name(first).ok_or_else(|| {
                DataError::NotFound(format!(
                    "cannot derive id of catalog {} from '{}'",
                    self.listing_name, first
                ))
            })?;

            logging::debug(
                DataSource::Opendap,
                Some(&self.listing_name),
                &format!("{} files, catalog id {}", files.len(), id),
            );
            self.id = Some(id);
            self.files = FileList::Resolved(files);
        }

        self.files
            .as_slice()
            .ok_or_else(|| DataError::NotFound(format!("catalog {} is unresolved", self.listing_name)))
    }

    /// Record for `catalogs.json`; `None` until the id is known.
    pub fn record(&self) -> Option<CatalogRecord> {
        Some(CatalogRecord {
            pk: self.pk,
            full_name: self.display_name.clone(),
            id: self.id?,
        })
    }
}

pub fn catalog_id_from_file_name(file_name: &str) -> Option<u64> {
    FILE_CATALOG_ID
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
}

pub fn station_code_from_file_name(file_name: &str) -> Option<&str> {
    FILE_STATION_CODE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// Stored catalog URLs
// ---------------------------------------------------------------------------

impl CatalogRecord {
    /// Listing name rebuilt from a stored record (`01_Afvoer`).
    pub fn listing_name(&self) -> String {
        format!("{:02}_{}", self.pk, self.full_name)
    }

    pub fn data_url(&self, settings: &Settings) -> String {
        format!("{}/{}/nc/", settings.data_url, self.listing_name())
    }

    pub fn catalog_page_url(&self, settings: &Settings) -> String {
        format!("{}/{}/nc/catalog.html", settings.catalog_url, self.listing_name())
    }

    /// OPeNDAP URL of a station file; station codes are upper case on the server.
    pub fn file_url(&self, settings: &Settings, location_code: &str) -> String {
        format!(
            "{}id{}-{}.nc",
            self.data_url(settings),
            self.id,
            location_code.to_uppercase()
        )
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Fetches the root listing and builds one unresolved catalog per entry.
pub fn discover_catalogs<F: HttpFetch + ?Sized>(fetch: &F, settings: &Settings) -> Result<Vec<Catalog>, DataError> {
    let root = format!("{}/catalog.html", settings.catalog_url);
    list_entries(fetch, &root)?
        .iter()
        .map(|name| Catalog::from_listing_name(name))
        .collect()
}

/// Catalog lookup by display name. The root listing is fetched on first use.
pub struct CatalogRegistry<'a, F: HttpFetch + ?Sized> {
    fetch: &'a F,
    settings: &'a Settings,
    catalogs: OnceCell<Vec<Catalog>>,
}

impl<'a, F: HttpFetch + ?Sized> CatalogRegistry<'a, F> {
    pub fn new(fetch: &'a F, settings: &'a Settings) -> Self {
        CatalogRegistry {
            fetch,
            settings,
            catalogs: OnceCell::new(),
        }
    }

    pub fn catalogs(&self) -> Result<&[Catalog], DataError> {
        if let Some(catalogs) = self.catalogs.get() {
            return Ok(catalogs);
        }
        let discovered = discover_catalogs(self.fetch, self.settings)?;
        Ok(self.catalogs.get_or_init(|| discovered))
    }

    /// Catalog number (`pk`) for a display name, compared case-insensitively.
    pub fn measurement_id(&self, display_name: &str) -> Result<u32, DataError> {
        self.find(display_name).map(Catalog::pk)
    }

    /// An unresolved copy of the named catalog.
    pub fn catalog(&self, display_name: &str) -> Result<Catalog, DataError> {
        self.find(display_name).cloned()
    }

    fn find(&self, display_name: &str) -> Result<&Catalog, DataError> {
        let wanted = display_name.to_lowercase();
        self.catalogs()?
            .iter()
            .find(|c| c.display_name.to_lowercase() == wanted)
            .ok_or_else(|| DataError::NotFound(format!("no catalog named '{}'", display_name)))
    }
}

// ---------------------------------------------------------------------------
// Station lookup
// ---------------------------------------------------------------------------

/// Finds the file of `station_name` in a catalog.
///
/// File names carry an abbreviated station code, so candidates are first
/// narrowed to files whose code letters all occur in the station name, then
/// confirmed by opening them and comparing the `stationname` attribute.
/// Candidates that fail to open are skipped.
pub fn find_station_file<F, O>(
    catalog: &mut Catalog,
    fetch: &F,
    settings: &Settings,
    reader: &GridReader<O>,
    station_name: &str,
) -> Result<Option<String>, DataError>
where
    F: HttpFetch + ?Sized,
    O: GridOpener,
{
    let wanted = station_name.to_lowercase();
    let files = catalog.resolve_files(fetch, settings)?.to_vec();

    for file_name in files {
        let Some(code) = station_code_from_file_name(&file_name) else {
            continue;
        };
        if !code.to_lowercase().chars().all(|c| wanted.contains(c)) {
            continue;
        }

        let url = catalog.file_url(settings, &file_name);
        match reader.read_meta(&url) {
            Ok(meta) if meta.station_name.to_lowercase() == wanted => return Ok(Some(url)),
            Ok(_) => {}
            Err(e) => logging::log_skipped_file(&url, &e),
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
