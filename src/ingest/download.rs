//! Waterinfo CSV downloads.
//!
//! Water levels (the `Waterhoogten` group) are requested for an absolute
//! UTC window; every other group takes a window in whole hours relative to
//! the time of the request. The response is a `;`-separated export with a
//! fixed six-line preamble.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::config::Settings;
use crate::ingest::HttpFetch;
use crate::logging::{self, DataSource};
use crate::measurement_types::MeasurementType;
use crate::model::{DataError, MeasurementSeries, Station};

/// Lines before the first data row of a CSV export.
pub const HEADER_LINES: usize = 6;

/// Request timestamp format. The API expects millisecond precision and
/// ignores the value, so it is sent as a literal.
pub const REQUEST_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.001Z";

/// Date and time columns of a CSV row, joined by a space.
pub const ROW_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Name given to series parsed from a CSV export.
pub const SERIES_NAME: &str = "value";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Vertical reference of water level downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TidalReference {
    /// Normaal Amsterdams Peil.
    #[default]
    Nap,
    /// Not applicable; the raw astronomical signal.
    Nvt,
}

impl TidalReference {
    pub fn as_str(&self) -> &'static str {
        match self {
            TidalReference::Nap => "NAP",
            TidalReference::Nvt => "NVT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub tidal_reference: TidalReference,
    /// Replaces the station's own expert parameter.
    pub expert_parameter: Option<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Case-insensitive lookup by station name or location code.
pub fn find_station<'s>(stations: &'s [Station], name_or_code: &str) -> Result<&'s Station, DataError> {
    stations
        .iter()
        .find(|s| s.matches(name_or_code))
        .ok_or_else(|| DataError::NotFound(format!("no station named or coded '{}'", name_or_code)))
}

pub fn validate_expert_parameter(slug: &str, allowed: &[&str]) -> Result<(), DataError> {
    if allowed.contains(&slug) {
        Ok(())
    } else {
        Err(DataError::NotFound(format!(
            "expert parameter '{}' is not offered, expected one of: {}",
            slug,
            allowed.join(", ")
        )))
    }
}

/// Query parameters for a CSV download, with `now` as the reference for
/// relative windows.
pub fn build_query_at(
    station: &Station,
    measurement: &MeasurementType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &QueryOptions,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>, DataError> {
    let expert_parameter = options
        .expert_parameter
        .clone()
        .or_else(|| station.expert_parameter.clone())
        .ok_or_else(|| {
            DataError::NotFound(format!("station '{}' reports no expert parameter", station.name))
        })?;

    let mut query = vec![
        ("expertParameter", expert_parameter),
        ("locationSlug", station.location_code.clone()),
    ];

    if measurement.is_tidal() {
        query.push(("startdate", start.format(REQUEST_DATE_FORMAT).to_string()));
        query.push(("enddate", end.format(REQUEST_DATE_FORMAT).to_string()));
        query.push(("timezone", "UTC".to_string()));
        query.push(("getijreference", options.tidal_reference.as_str().to_string()));
    } else {
        query.push((
            "timehorizon",
            format!("{},{}", hours_from(now, start), hours_from(now, end)),
        ));
    }
    Ok(query)
}

/// Whole hours from `now` to `t`, truncated toward zero.
fn hours_from(now: DateTime<Utc>, t: DateTime<Utc>) -> i64 {
    (t - now).num_seconds() / 3600
}

/// Downloads the raw CSV export for one station.
///
/// # Errors
/// - `DataError::NotFound` if no station matches, or it has no expert parameter.
/// - `DataError::Http` / `DataError::Fetch` if the download fails.
#[allow(clippy::too_many_arguments)]
pub fn fetch_series<F: HttpFetch + ?Sized>(
    fetch: &F,
    settings: &Settings,
    measurement: &MeasurementType,
    stations: &[Station],
    name_or_code: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &QueryOptions,
) -> Result<String, DataError> {
    let station = find_station(stations, name_or_code)?;
    let query = build_query_at(station, measurement, start, end, options, Utc::now())?;

    logging::debug(
        DataSource::Waterinfo,
        Some(&station.location_code),
        &format!("Downloading {} from {} to {}", measurement.name, start, end),
    );
    fetch.get_text(&settings.download_csv_url, &query)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a CSV export into a series.
///
/// Each data row is `date;time;...;value;`. The empty field after the last
/// separator is required. Timestamps are UTC. Blank lines are only allowed
/// at the end of the export.
///
/// # Errors
/// `DataError::Format` with the 1-based line number for the first blank
/// row between data rows, or row with too few fields, a bad timestamp or
/// value, or a repeated timestamp.
pub fn parse_series(raw: &str) -> Result<MeasurementSeries, DataError> {
    let mut series = MeasurementSeries::new(SERIES_NAME);
    let lines: Vec<&str> = raw.lines().collect();
    let data_end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);

    for (index, line) in lines.iter().enumerate().take(data_end).skip(HEADER_LINES) {
        let line_no = index + 1;
        if line.trim().is_empty() {
            return Err(DataError::format(line_no, "blank line between data rows"));
        }

        let mut fields: Vec<&str> = line.split(';').collect();
        match fields.pop() {
            Some(last) if last.trim().is_empty() => {}
            _ => return Err(DataError::format(line_no, "row does not end with ';'")),
        }
        if fields.len() < 3 {
            return Err(DataError::format(
                line_no,
                format!("expected at least 3 fields, found {}", fields.len()),
            ));
        }

        let stamp = format!("{} {}", fields[0].trim(), fields[1].trim());
        let naive = NaiveDateTime::parse_from_str(&stamp, ROW_TIMESTAMP_FORMAT)
            .map_err(|e| DataError::format(line_no, format!("bad timestamp '{}': {}", stamp, e)))?;

        let value_text = fields[fields.len() - 1].trim();
        let value: f64 = value_text
            .parse()
            .map_err(|_| DataError::format(line_no, format!("bad value '{}'", value_text)))?;

        if !series.push(Utc.from_utc_datetime(&naive), value) {
            return Err(DataError::format(line_no, format!("duplicate timestamp '{}'", stamp)));
        }
    }

    Ok(series)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
