//! Coordinate reprojection between the reference systems Rijkswaterstaat uses.
//!
//! Waterinfo reports station positions in ETRS89 / UTM zone 31N
//! (`epsg:25831`) for most measurement types and in WGS84 (`epsg:4326`) for a
//! few; older datasets use the Dutch RD New grid (`epsg:28992`). A
//! [`Reprojector`] converts `(x, y)` pairs (longitude/easting first) from one
//! system to another by going through geographic WGS84 coordinates.
//!
//! Supported systems:
//! - `epsg:4326`, `epsg:4258`: geographic degrees. ETRS89 and WGS84 differ by
//!   well under a metre in the Netherlands and are treated as identical.
//! - `epsg:326zz`, `epsg:327zz`, `epsg:258zz`: UTM zone `zz` (north/south),
//!   Transverse Mercator series from Snyder, *Map Projections: A Working
//!   Manual* (USGS PP 1395), pp. 60–64.
//! - `epsg:3857`: spherical web mercator.
//! - `epsg:28992`: RD New via the published RD/WGS84 polynomial
//!   approximation (Schreutelkamp & Strang van Hees), accurate to about a metre.

use std::f64::consts::PI;
use std::fmt;

use crate::model::DataError;

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// RD New reference point (Amersfoort) in RD metres and WGS84 degrees
const RD_X0: f64 = 155_000.0;
const RD_Y0: f64 = 463_000.0;
const RD_LAT0: f64 = 52.155_174_40;
const RD_LON0: f64 = 5.387_206_21;

// ---------------------------------------------------------------------------
// Coordinate reference systems
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Longitude/latitude in degrees.
    Geographic { epsg: u32 },
    /// Easting/northing in metres.
    Utm { epsg: u32, zone: u8, north: bool },
    WebMercator,
    RdNew,
}

impl Crs {
    /// Parses `epsg:NNNN`, `EPSG:NNNN` or `urn:ogc:def:crs:EPSG::NNNN`.
    pub fn parse(label: &str) -> Result<Crs, DataError> {
        let lowered = label.trim().to_lowercase();
        let code = lowered
            .rsplit(':')
            .next()
            .filter(|_| lowered.contains("epsg"))
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| DataError::Parse(format!("unrecognised CRS label '{}'", label)))?;
        Crs::from_epsg(code)
    }

    pub fn from_epsg(code: u32) -> Result<Crs, DataError> {
        match code {
            4326 | 4258 => Ok(Crs::Geographic { epsg: code }),
            3857 => Ok(Crs::WebMercator),
            28992 => Ok(Crs::RdNew),
            32601..=32660 => Ok(Crs::Utm { epsg: code, zone: (code - 32600) as u8, north: true }),
            32701..=32760 => Ok(Crs::Utm { epsg: code, zone: (code - 32700) as u8, north: false }),
            25828..=25838 => Ok(Crs::Utm { epsg: code, zone: (code - 25800) as u8, north: true }),
            _ => Err(DataError::Parse(format!("unsupported CRS epsg:{}", code))),
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Geographic { epsg } | Crs::Utm { epsg, .. } => *epsg,
            Crs::WebMercator => 3857,
            Crs::RdNew => 28992,
        }
    }

    /// Lowercase label, the form stations carry.
    pub fn label(&self) -> String {
        format!("epsg:{}", self.epsg())
    }

    fn unproject(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Crs::Geographic { .. } => (x, y),
            Crs::Utm { zone, north, .. } => utm_inverse(x, y, zone, north),
            Crs::WebMercator => web_mercator_inverse(x, y),
            Crs::RdNew => rd_to_wgs84(x, y),
        }
    }

    fn project(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Crs::Geographic { .. } => (lon, lat),
            Crs::Utm { zone, north, .. } => utm_forward(lon, lat, zone, north),
            Crs::WebMercator => web_mercator_forward(lon, lat),
            Crs::RdNew => wgs84_to_rd(lon, lat),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Reprojector
// ---------------------------------------------------------------------------

/// A pure transform from `source` to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojector {
    pub source: Crs,
    pub target: Crs,
}

impl Reprojector {
    pub fn new(source: &str, target: &str) -> Result<Reprojector, DataError> {
        Ok(Reprojector {
            source: Crs::parse(source)?,
            target: Crs::parse(target)?,
        })
    }

    /// Transforms a point from `source` into `target`.
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        if self.source == self.target {
            return (x, y);
        }
        let (lon, lat) = self.source.unproject(x, y);
        self.target.project(lon, lat)
    }

    /// Transforms a point from `target` back into `source`.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if self.source == self.target {
            return (x, y);
        }
        let (lon, lat) = self.target.unproject(x, y);
        self.source.project(lon, lat)
    }
}

// ---------------------------------------------------------------------------
// Transverse Mercator (UTM)
// ---------------------------------------------------------------------------

fn central_meridian(zone: u8) -> f64 {
    (zone as f64 * 6.0 - 183.0).to_radians()
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

fn utm_forward(lon: f64, lat: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let phi = lat.to_radians();
    let lambda = lon.to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * cos_phi * cos_phi;
    let a = (lambda - central_meridian(zone)) * cos_phi;
    let m = meridian_arc(phi, e2);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
    let y = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    let northing = if north { y } else { y + UTM_FALSE_NORTHING_SOUTH };
    (x + UTM_FALSE_EASTING, northing)
}

fn utm_inverse(easting: f64, northing: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let x = easting - UTM_FALSE_EASTING;
    let y = if north { northing } else { northing - UTM_FALSE_NORTHING_SOUTH };

    // Footpoint latitude
    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = phi1.tan().powi(2);
    let n1 = WGS84_A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos_phi1;

    (lambda.to_degrees(), phi.to_degrees())
}

// ---------------------------------------------------------------------------
// Web mercator
// ---------------------------------------------------------------------------

fn web_mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    let x = WGS84_A * lon.to_radians();
    let y = WGS84_A * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

// ---------------------------------------------------------------------------
// RD New
// ---------------------------------------------------------------------------

fn rd_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let dx = (x - RD_X0) * 1e-5;
    let dy = (y - RD_Y0) * 1e-5;

    let sum_n = 3235.65389 * dy - 32.58297 * dx.powi(2) - 0.2475 * dy.powi(2)
        - 0.84978 * dx.powi(2) * dy
        - 0.0655 * dy.powi(3)
        - 0.01709 * dx.powi(2) * dy.powi(2)
        - 0.00738 * dx
        + 0.0053 * dx.powi(4)
        - 0.00039 * dx.powi(2) * dy.powi(3)
        + 0.00033 * dx.powi(4) * dy
        - 0.00012 * dx * dy;
    let sum_e = 5260.52916 * dx + 105.94684 * dx * dy + 2.45656 * dx * dy.powi(2)
        - 0.81885 * dx.powi(3)
        + 0.05594 * dx * dy.powi(3)
        - 0.05607 * dx.powi(3) * dy
        + 0.01199 * dy
        - 0.00256 * dx.powi(3) * dy.powi(2)
        + 0.00128 * dx * dy.powi(4)
        + 0.00022 * dy.powi(2)
        - 0.00022 * dx.powi(2)
        + 0.00026 * dx.powi(5);

    (RD_LON0 + sum_e / 3600.0, RD_LAT0 + sum_n / 3600.0)
}

fn wgs84_to_rd(lon: f64, lat: f64) -> (f64, f64) {
    let dphi = 0.36 * (lat - RD_LAT0);
    let dlam = 0.36 * (lon - RD_LON0);

    let sum_x = 190094.945 * dlam - 11832.228 * dphi * dlam - 114.221 * dphi.powi(2) * dlam
        - 32.391 * dlam.powi(3)
        - 0.705 * dphi
        - 2.34 * dphi.powi(3) * dlam
        - 0.608 * dphi * dlam.powi(3)
        - 0.008 * dlam.powi(2)
        + 0.148 * dphi.powi(2) * dlam.powi(3);
    let sum_y = 309056.544 * dphi + 3638.893 * dlam.powi(2) + 73.077 * dphi.powi(2)
        - 157.984 * dphi * dlam.powi(2)
        + 59.788 * dphi.powi(3)
        + 0.433 * dlam
        - 6.439 * dphi.powi(2) * dlam.powi(2)
        - 0.032 * dphi * dlam
        + 0.092 * dlam.powi(4)
        - 0.054 * dphi * dlam.powi(4);

    (RD_X0 + sum_x, RD_Y0 + sum_y)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
