//! Rijkswaterstaat water data scraper.
//!
//! Two public sources are covered:
//! - the Waterbase archive on the Deltares THREDDS server (`ingest::thredds`,
//!   `ingest::catalog`, `ingest::grid`, `ingest::extract`), whose station
//!   metadata ends up in the catalog store (`store`);
//! - the Waterinfo API (`ingest::waterinfo`, `ingest::download`) for station
//!   listings and recent measurement series.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod measurement_types;
pub mod model;
pub mod projection;
pub mod store;
