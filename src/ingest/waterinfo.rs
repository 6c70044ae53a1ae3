//! Waterinfo station directory.
//!
//! The latest-measurements endpoint returns a GeoJSON feature collection
//! with one feature per station reporting the requested measurement type.
//! Each feature carries its own CRS, so a listing can mix projected and
//! geographic coordinates until it is normalized.

use serde::Deserialize;
use std::cell::OnceCell;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::ingest::download::{self, QueryOptions};
use crate::ingest::HttpFetch;
use crate::logging::{self, DataSource};
use crate::measurement_types::{require_measurement_type, MeasurementType};
use crate::model::{DataError, MeasurementSeries, Station};
use crate::projection::{Crs, Reprojector};

/// CRS the station list is normalized to when none is given.
pub const DEFAULT_STATION_CRS: &str = "epsg:25831";

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
    geometry: Geometry,
    crs: FeatureCrs,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    name: String,
    #[serde(rename = "locationCode")]
    location_code: String,
    #[serde(default)]
    measurements: Vec<LatestMeasurement>,
}

#[derive(Debug, Deserialize)]
struct LatestMeasurement {
    #[serde(rename = "parameterId")]
    parameter_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct FeatureCrs {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

/// One selectable parameter of a Waterinfo download group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadParameter {
    pub slug: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct DownloadGroup {
    label: String,
    #[serde(default)]
    parameters: Vec<DownloadParameter>,
}

// ---------------------------------------------------------------------------
// Station listing
// ---------------------------------------------------------------------------

/// Lists the stations reporting `measurement_type`.
///
/// # Errors
/// - `DataError::NotFound` if the type is not in the registry.
/// - `DataError::Http` / `DataError::Fetch` if the request fails.
/// - `DataError::Parse` if the response is not the expected GeoJSON.
pub fn list_stations<F: HttpFetch + ?Sized>(
    fetch: &F,
    settings: &Settings,
    measurement_type: &str,
) -> Result<Vec<Station>, DataError> {
    let measurement = require_measurement_type(measurement_type)?;
    let body = fetch.get_text(
        &settings.latest_measurements_url,
        &[("parameterid", measurement.name.to_string())],
    )?;
    let stations = parse_stations(&body)?;

    logging::debug(
        DataSource::Waterinfo,
        Some(measurement.name),
        &format!("{} stations listed ({})", stations.len(), measurement.description),
    );
    Ok(stations)
}

/// Maps a latest-measurements response to stations. CRS labels are kept as
/// given, lower-cased; they are only interpreted by [`normalize_crs`].
pub fn parse_stations(json: &str) -> Result<Vec<Station>, DataError> {
    let collection: FeatureCollection = serde_json::from_str(json)?;

    collection
        .features
        .into_iter()
        .map(|feature| {
            let (x, y) = match feature.geometry.coordinates.as_slice() {
                [x, y, ..] => (*x, *y),
                _ => {
                    return Err(DataError::Parse(format!(
                        "station '{}' has no point coordinates",
                        feature.properties.name
                    )));
                }
            };
            let crs = feature.crs.properties.name.trim().to_lowercase();
            let expert_parameter = feature
                .properties
                .measurements
                .into_iter()
                .next()
                .and_then(|m| m.parameter_id);

            Ok(Station {
                name: feature.properties.name,
                location_code: feature.properties.location_code,
                coordinates: (x, y),
                crs,
                expert_parameter,
            })
        })
        .collect()
}

/// Reprojects every station not already in `target`, in place.
///
/// One transform is built per distinct source CRS, before any station is
/// touched, so an unsupported source CRS leaves the list unchanged. Returns
/// the number of stations rewritten; a second call with the same target
/// rewrites none.
pub fn normalize_crs(stations: &mut [Station], target: &str) -> Result<usize, DataError> {
    let target_label = Crs::parse(target)?.label();
    let sources: BTreeSet<String> = stations
        .iter()
        .filter(|s| s.crs != target_label)
        .map(|s| s.crs.clone())
        .collect();
    let reprojectors = sources
        .into_iter()
        .map(|source| Reprojector::new(&source, &target_label).map(|r| (source, r)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rewritten = 0;
    for (source, reprojector) in reprojectors {
        for station in stations.iter_mut().filter(|s| s.crs == source) {
            let (x, y) = station.coordinates;
            station.coordinates = reprojector.forward(x, y);
            station.crs = target_label.clone();
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

// ---------------------------------------------------------------------------
// Download parameters
// ---------------------------------------------------------------------------

/// Parameters offered for download in `group` (a download group label such
/// as `Waterhoogten`).
pub fn fetch_download_parameters<F: HttpFetch + ?Sized>(
    fetch: &F,
    settings: &Settings,
    group: &str,
) -> Result<Vec<DownloadParameter>, DataError> {
    let body = fetch.get_text(&settings.download_groups_url, &[])?;
    parse_download_parameters(&body, group)
}

pub fn parse_download_parameters(json: &str, group: &str) -> Result<Vec<DownloadParameter>, DataError> {
    let groups: Vec<DownloadGroup> = serde_json::from_str(json)?;
    groups
        .into_iter()
        .find(|g| g.label.eq_ignore_ascii_case(group))
        .map(|g| g.parameters)
        .ok_or_else(|| DataError::NotFound(format!("no download group '{}'", group)))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The stations of one measurement type, plus the queries that use them.
pub struct Waterinfo<'a, F: HttpFetch + ?Sized> {
    fetch: &'a F,
    settings: &'a Settings,
    measurement: &'static MeasurementType,
    stations: Vec<Station>,
    parameters: OnceCell<Vec<DownloadParameter>>,
}

impl<'a, F: HttpFetch + ?Sized> Waterinfo<'a, F> {
    /// Looks up the measurement type and lists its stations.
    pub fn connect(fetch: &'a F, settings: &'a Settings, measurement_type: &str) -> Result<Self, DataError> {
        let measurement = require_measurement_type(measurement_type)?;
        let stations = list_stations(fetch, settings, measurement.name)?;
        Ok(Waterinfo {
            fetch,
            settings,
            measurement,
            stations,
            parameters: OnceCell::new(),
        })
    }

    pub fn measurement(&self) -> &'static MeasurementType {
        self.measurement
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn station(&self, name_or_code: &str) -> Result<&Station, DataError> {
        download::find_station(&self.stations, name_or_code)
    }

    /// Reprojects the station list to `target` (`epsg:25831` if `None`).
    pub fn update_station_crs(&mut self, target: Option<&str>) -> Result<usize, DataError> {
        normalize_crs(&mut self.stations, target.unwrap_or(DEFAULT_STATION_CRS))
    }

    /// Download parameters of this type's group, fetched on first use.
    pub fn download_parameters(&self) -> Result<&[DownloadParameter], DataError> {
        if let Some(parameters) = self.parameters.get() {
            return Ok(parameters);
        }
        let fetched = fetch_download_parameters(self.fetch, self.settings, self.measurement.group)?;
        Ok(self.parameters.get_or_init(|| fetched))
    }

    /// Raw CSV for one station. An expert parameter override in `options`
    /// must be one of the group's download parameters.
    pub fn fetch_series(
        &self,
        name_or_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &QueryOptions,
    ) -> Result<String, DataError> {
        if let Some(slug) = &options.expert_parameter {
            let allowed: Vec<&str> = self.download_parameters()?.iter().map(|p| p.slug.as_str()).collect();
            download::validate_expert_parameter(slug, &allowed)?;
        }
        download::fetch_series(
            self.fetch,
            self.settings,
            self.measurement,
            &self.stations,
            name_or_code,
            start,
            end,
            options,
        )
    }

    pub fn fetch_parsed_series(
        &self,
        name_or_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &QueryOptions,
    ) -> Result<MeasurementSeries, DataError> {
        let raw = self.fetch_series(name_or_code, start, end, options)?;
        download::parse_series(&raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
