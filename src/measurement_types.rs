//! Waterinfo measurement type registry.
//!
//! Defines the measurement types this service can query on Waterinfo and
//! the download group each one belongs to. The type name is sent as the
//! `parameterid` of latest-measurement requests; the group decides which
//! download parameters are valid and how the query time window is encoded.

use crate::model::DataError;

// ---------------------------------------------------------------------------
// Download groups
// ---------------------------------------------------------------------------

pub const GROUP_WATERHOOGTEN: &str = "Waterhoogten";
pub const GROUP_AFVOER: &str = "Afvoer";
pub const GROUP_WIND: &str = "Wind";
pub const GROUP_WATERTEMPERATUUR: &str = "Watertemperatuur";
pub const GROUP_STROMING: &str = "Stroming";
pub const GROUP_GOLVEN: &str = "Golven";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub struct MeasurementType {
    /// Waterinfo parameter id, e.g. `waterhoogte-t-o-v-nap`.
    pub name: &'static str,
    /// Label of the Waterinfo download group.
    pub group: &'static str,
    /// Human-readable summary, shown in usage text and logs.
    pub description: &'static str,
}

impl MeasurementType {
    /// Tidal types are queried with absolute start and end dates; the others
    /// with an hour offset relative to now.
    pub fn is_tidal(&self) -> bool {
        self.group == GROUP_WATERHOOGTEN
    }
}

pub static MEASUREMENT_TYPES: &[MeasurementType] = &[
    MeasurementType {
        name: "waterhoogte-t-o-v-nap",
        group: GROUP_WATERHOOGTEN,
        description: "Measured water level relative to NAP",
    },
    MeasurementType {
        name: "astronomische-getij",
        group: GROUP_WATERHOOGTEN,
        description: "Astronomical tide prediction",
    },
    MeasurementType {
        name: "waterafvoer",
        group: GROUP_AFVOER,
        description: "River discharge",
    },
    MeasurementType {
        name: "wind",
        group: GROUP_WIND,
        description: "Wind speed and direction",
    },
    MeasurementType {
        name: "watertemperatuur",
        group: GROUP_WATERTEMPERATUUR,
        description: "Surface water temperature",
    },
    MeasurementType {
        name: "stroming",
        group: GROUP_STROMING,
        description: "Current speed and direction",
    },
    MeasurementType {
        name: "golfhoogte",
        group: GROUP_GOLVEN,
        description: "Significant wave height",
    },
];

pub fn all_names() -> Vec<&'static str> {
    MEASUREMENT_TYPES.iter().map(|t| t.name).collect()
}

/// Looks up a measurement type by name. Returns `None` if not found.
pub fn find_measurement_type(name: &str) -> Option<&'static MeasurementType> {
    MEASUREMENT_TYPES.iter().find(|t| t.name == name)
}

pub fn require_measurement_type(name: &str) -> Result<&'static MeasurementType, DataError> {
    find_measurement_type(name).ok_or_else(|| {
        DataError::NotFound(format!(
            "unknown measurement type '{}', expected one of: {}",
            name,
            all_names().join(", ")
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
