//! Reading Waterbase netCDF files over OPeNDAP.
//!
//! The THREDDS server regularly refuses or drops connections under load, so
//! every open goes through a bounded retry loop. Each read opens the file,
//! copies what it needs, and drops the handle before returning.
//!
//! The file format itself sits behind [`GridOpener`] / [`GridDataset`]; the
//! netCDF-backed implementation lives in `netcdf_source` (feature `netcdf`).

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use std::collections::HashSet;

use crate::config::Settings;
use crate::logging::{self, DataSource};
use crate::model::{DataError, MeasurementSeries, StationMeta};

/// Name of the time variable in every Waterbase file (days since 1970-01-01).
pub const TIME_VARIABLE: &str = "time";

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

// ---------------------------------------------------------------------------
// Dataset abstraction
// ---------------------------------------------------------------------------

/// A global attribute value, reduced to the two shapes the scraper uses.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
}

/// An open grid file. Dropping the value closes it.
pub trait GridDataset {
    fn attribute(&self, name: &str) -> Option<AttrValue>;
    /// Variable names in declaration order.
    fn variable_names(&self) -> Vec<String>;
    /// All values of a variable, flattened.
    fn read_values(&self, variable: &str) -> Result<Vec<f64>, DataError>;
}

pub trait GridOpener {
    type Dataset: GridDataset;

    /// Opens a file by path or OPeNDAP URL. Failures to reach or open the
    /// file must be reported as `DataError::Open` so they are retried.
    fn open(&self, path: &str) -> Result<Self::Dataset, DataError>;
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct GridReader<O> {
    opener: O,
    retries: u32,
    timezone: Tz,
}

impl<O: GridOpener> GridReader<O> {
    /// Builds a reader using the configured retry budget and time zone.
    pub fn new(opener: O, settings: &Settings) -> Result<Self, DataError> {
        let timezone = parse_timezone(&settings.timezone)?;
        Ok(GridReader::with_retries(opener, settings.open_retries, timezone))
    }

    pub fn with_retries(opener: O, retries: u32, timezone: Tz) -> Self {
        GridReader {
            opener,
            retries,
            timezone,
        }
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Opens `path`, retrying up to `retries` more times on `DataError::Open`.
    /// Any other error, or the last open error, is returned unchanged.
    pub fn open(&self, path: &str) -> Result<O::Dataset, DataError> {
        let mut retried = 0;
        loop {
            match self.opener.open(path) {
                Ok(dataset) => return Ok(dataset),
                Err(DataError::Open(msg)) if retried < self.retries => {
                    retried += 1;
                    logging::warn(
                        DataSource::Opendap,
                        Some(path),
                        &format!("Open failed, retry {}/{}: {}", retried, self.retries, msg),
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads station metadata from the file's global attributes.
    pub fn read_meta(&self, path: &str) -> Result<StationMeta, DataError> {
        let dataset = self.open(path)?;

        Ok(StationMeta {
            station_name: text_attribute(&dataset, "stationname")?,
            location_code: text_attribute(&dataset, "locationcode")?,
            lat: number_attribute(&dataset, "geospatial_lat_min")?,
            lon: number_attribute(&dataset, "geospatial_lon_min")?,
            time_coverage_start: text_attribute(&dataset, "time_coverage_start")?,
            time_coverage_end: text_attribute(&dataset, "time_coverage_end")?,
        })
    }

    /// Reads the file's measurement variable (the last one declared) and
    /// keeps the points whose timestamp falls in `[start, end]`.
    ///
    /// A time value repeated in the file is a parse error. Two different wall
    /// times that convert to the same UTC instant keep the first value and
    /// log the dropped one.
    pub fn read_series(
        &self,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MeasurementSeries, DataError> {
        let (name, times, values) = {
            let dataset = self.open(path)?;
            let name = dataset
                .variable_names()
                .pop()
                .ok_or_else(|| DataError::Parse(format!("{} declares no variables", path)))?;
            let times = dataset.read_values(TIME_VARIABLE)?;
            let values = dataset.read_values(&name)?;
            (name, times, values)
        };

        if times.len() != values.len() {
            return Err(DataError::Parse(format!(
                "{}: {} timestamps for {} values of '{}'",
                path,
                times.len(),
                values.len(),
                name
            )));
        }

        let mut series = MeasurementSeries::new(&name);
        let mut seen_minutes = HashSet::new();
        for (days, value) in times.into_iter().zip(values) {
            let minutes = waterbase_minutes(days)?;
            if !seen_minutes.insert(minutes) {
                return Err(DataError::Parse(format!(
                    "{}: duplicate time value {}",
                    path, days
                )));
            }
            let timestamp = wall_minutes_to_utc(minutes, self.timezone)?;
            if timestamp < start || timestamp > end {
                continue;
            }
            // Distinct wall times can land on one instant around the spring
            // clock change; the first value wins.
            if !series.push(timestamp, value) {
                logging::warn(
                    DataSource::Opendap,
                    Some(path),
                    &format!("Dropping value {} at {}: instant already taken", value, timestamp),
                );
            }
        }
        Ok(series)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_timezone(name: &str) -> Result<Tz, DataError> {
    name.parse::<Tz>()
        .map_err(|_| DataError::Parse(format!("unknown time zone '{}'", name)))
}

/// Converts a Waterbase time value (days since the epoch, wall clock in
/// `timezone`) to UTC, rounded to the nearest minute.
///
/// Ambiguous wall times (autumn clock change) resolve to the earlier
/// instant; wall times skipped in spring use the zone's standard offset.
pub fn waterbase_time_to_utc(days: f64, timezone: Tz) -> Result<DateTime<Utc>, DataError> {
    wall_minutes_to_utc(waterbase_minutes(days)?, timezone)
}

fn waterbase_minutes(days: f64) -> Result<i64, DataError> {
    if !days.is_finite() {
        return Err(DataError::Parse(format!("invalid time value {}", days)));
    }
    Ok((days * MINUTES_PER_DAY).round() as i64)
}

fn wall_minutes_to_utc(minutes: i64, timezone: Tz) -> Result<DateTime<Utc>, DataError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DataError::Parse("epoch out of range".to_string()))?;
    let wall = Duration::try_minutes(minutes)
        .and_then(|delta| epoch.checked_add_signed(delta))
        .ok_or_else(|| DataError::Parse(format!("time offset of {} minutes out of range", minutes)))?;

    let utc = match timezone.from_local_datetime(&wall).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => {
            let standard = timezone.offset_from_utc_datetime(&wall).base_utc_offset();
            Utc.from_utc_datetime(&(wall - standard))
        }
    };
    Ok(utc)
}

fn text_attribute<D: GridDataset>(dataset: &D, name: &str) -> Result<String, DataError> {
    match dataset.attribute(name) {
        Some(AttrValue::Text(text)) => Ok(text),
        Some(AttrValue::Number(n)) => Ok(n.to_string()),
        None => Err(DataError::Parse(format!("missing attribute '{}'", name))),
    }
}

fn number_attribute<D: GridDataset>(dataset: &D, name: &str) -> Result<f64, DataError> {
    match dataset.attribute(name) {
        Some(AttrValue::Number(n)) => Ok(n),
        Some(AttrValue::Text(text)) => text.trim().parse().map_err(|_| {
            DataError::Parse(format!("attribute '{}' is not numeric: '{}'", name, text))
        }),
        None => Err(DataError::Parse(format!("missing attribute '{}'", name))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;

    const PATH: &str = "http://thredds.test/dodsC/waterbase/01_Afvoer/nc/id1-LOBH.nc";

    fn reader(opener: FakeOpener) -> GridReader<FakeOpener> {
        GridReader::with_retries(opener, 3, chrono_tz::MET)
    }

    #[test]
    fn test_open_succeeds_after_two_transient_failures() {
        let opener = FakeOpener::new()
            .with_dataset(PATH, FakeDataset::station("Lobith", "LOBH"))
            .failing_first(2);
        let reader = reader(opener);

        let meta = reader.read_meta(PATH).expect("third attempt should succeed");
        assert_eq!(meta.station_name, "Lobith");
        assert_eq!(reader.opener().attempts.get(), 3, "two retries after the first attempt");
    }

    #[test]
    fn test_open_gives_up_after_retry_budget() {
        let reader = reader(FakeOpener::new().with_broken(PATH));

        let result = reader.read_meta(PATH);
        assert!(matches!(result, Err(DataError::Open(_))), "got {:?}", result);
        assert_eq!(reader.opener().attempts.get(), 4, "one attempt plus exactly three retries");
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let reader = GridReader::with_retries(FakeOpener::new().with_broken(PATH), 0, chrono_tz::MET);
        assert!(reader.open(PATH).is_err());
        assert_eq!(reader.opener().attempts.get(), 1);
    }

    #[test]
    fn test_read_meta_copies_attributes_and_releases_handle() {
        let reader = reader(FakeOpener::new().with_dataset(PATH, FakeDataset::station("Lobith", "LOBH")));

        let meta = reader.read_meta(PATH).expect("meta should be read");
        assert_eq!(meta.location_code, "LOBH");
        assert_eq!(meta.lat, 51.98);
        assert_eq!(meta.time_coverage_start, "1990-01-01P00:00:00");
        assert_eq!(reader.opener().live.get(), 0, "handle must be closed after reading");
    }

    #[test]
    fn test_missing_attribute_is_a_parse_error() {
        let mut dataset = FakeDataset::station("Lobith", "LOBH");
        dataset.attributes.remove("locationcode");
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let result = reader.read_meta(PATH);
        assert!(matches!(result, Err(DataError::Parse(_))), "got {:?}", result);
        assert_eq!(reader.opener().attempts.get(), 1, "parse errors are not retried");
    }

    #[test]
    fn test_met_winter_time_is_one_hour_ahead_of_utc() {
        // 2000-01-01 00:00 local = 10957 days after the epoch.
        let utc = waterbase_time_to_utc(10957.0, chrono_tz::MET).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(1999, 12, 31, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_met_summer_time_is_two_hours_ahead_of_utc() {
        // 2000-07-01 12:00 local.
        let days = 11139.0 + 0.5;
        let utc = waterbase_time_to_utc(days, chrono_tz::MET).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2000, 7, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_time_is_rounded_to_whole_minutes() {
        // 00:10 local plus 20 seconds of float noise.
        let days = 10957.0 + (10.0 * 60.0 + 20.0) / 86400.0;
        let utc = waterbase_time_to_utc(days, chrono_tz::MET).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(1999, 12, 31, 23, 10, 0).unwrap());
    }

    #[test]
    fn test_read_series_uses_last_variable_and_filters_closed_range() {
        let ten_minutes = 10.0 / MINUTES_PER_DAY;
        let times: Vec<f64> = (0..6).map(|i| 10957.0 + i as f64 * ten_minutes).collect();
        let dataset = FakeDataset::station("Lobith", "LOBH")
            .with_variable("time", times)
            .with_variable("lat", vec![51.98; 6])
            .with_variable("sea_surface_height", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let start = Utc.with_ymd_and_hms(1999, 12, 31, 23, 10, 0).unwrap();
        let end = Utc.with_ymd_and_hms(1999, 12, 31, 23, 30, 0).unwrap();
        let series = reader.read_series(PATH, start, end).expect("series should be read");

        assert_eq!(series.name, "sea_surface_height");
        let values: Vec<f64> = series.points().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0], "both bounds are inclusive");
        assert_eq!(series.first().map(|(t, _)| t), Some(start));
    }

    /// Ten-minute samples from 01:00 to 03:50 local time on the given day.
    fn night_of(days_since_epoch: f64) -> Vec<f64> {
        (6..24).map(|i| days_since_epoch + i as f64 * 10.0 / MINUTES_PER_DAY).collect()
    }

    #[test]
    fn test_met_spring_gap_uses_standard_offset() {
        // 2000-03-26 02:30 local does not exist; standard time is UTC+1.
        let days = 11042.0 + 150.0 / MINUTES_PER_DAY;
        let utc = waterbase_time_to_utc(days, chrono_tz::MET).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2000, 3, 26, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_met_autumn_overlap_takes_earlier_instant() {
        // 2000-10-29 02:30 local occurs twice; the summer time reading is first.
        let days = 11259.0 + 150.0 / MINUTES_PER_DAY;
        let utc = waterbase_time_to_utc(days, chrono_tz::MET).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2000, 10, 29, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_read_series_across_spring_change_keeps_first_of_colliding_values() {
        let times = night_of(11042.0);
        let values: Vec<f64> = (0..times.len()).map(|i| i as f64).collect();
        let dataset = FakeDataset::station("Lobith", "LOBH")
            .with_variable("time", times)
            .with_variable("discharge", values);
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let series = reader
            .read_series(PATH, start, end)
            .expect("a clock change night must not fail the read");

        // 02:xx (standard offset) and 03:xx (summer offset) both map to 01:xx UTC.
        assert_eq!(series.len(), 12);
        assert_eq!(series.first().map(|(t, _)| t), Some(Utc.with_ymd_and_hms(2000, 3, 26, 0, 0, 0).unwrap()));
        assert_eq!(series.get(Utc.with_ymd_and_hms(2000, 3, 26, 1, 0, 0).unwrap()), Some(6.0));
        assert_eq!(series.last(), Some((Utc.with_ymd_and_hms(2000, 3, 26, 1, 50, 0).unwrap(), 11.0)));
        let instants: Vec<_> = series.points().iter().map(|(t, _)| *t).collect();
        assert!(instants.windows(2).all(|w| w[0] < w[1]), "instants must stay ordered");
    }

    #[test]
    fn test_read_series_across_autumn_change_keeps_every_value() {
        let times = night_of(11259.0);
        let dataset = FakeDataset::station("Lobith", "LOBH")
            .with_variable("time", times)
            .with_variable("discharge", vec![1.0; 18]);
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let series = reader.read_series(PATH, start, end).expect("series should be read");

        assert_eq!(series.len(), 18);
        assert_eq!(series.first().map(|(t, _)| t), Some(Utc.with_ymd_and_hms(2000, 10, 28, 23, 0, 0).unwrap()));
        assert_eq!(series.last().map(|(t, _)| t), Some(Utc.with_ymd_and_hms(2000, 10, 29, 2, 50, 0).unwrap()));
    }

    #[test]
    fn test_read_series_rejects_repeated_time_value() {
        let dataset = FakeDataset::station("Lobith", "LOBH")
            .with_variable("time", vec![10957.0, 10957.0])
            .with_variable("discharge", vec![1.0, 2.0]);
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let start = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(reader.read_series(PATH, start, end), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_read_series_rejects_length_mismatch() {
        let dataset = FakeDataset::station("Lobith", "LOBH")
            .with_variable("time", vec![10957.0, 10957.5])
            .with_variable("discharge", vec![1.0]);
        let reader = reader(FakeOpener::new().with_dataset(PATH, dataset));

        let start = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(reader.read_series(PATH, start, end), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let mut settings = Settings::default();
        settings.timezone = "Mars/Olympus".to_string();
        assert!(GridReader::new(FakeOpener::new(), &settings).is_err());
    }
}
