//! Waterinfo Station Listing
//!
//! Prints the stations reporting one measurement type as JSON, with all
//! coordinates reprojected into a single CRS.
//!
//! Usage:
//!   cargo run --bin waterinfo_stations -- <measurement-type> [crs]
//!
//!   measurement-type  one of the registered types (e.g. wind, waterafvoer)
//!   crs               target CRS label (default: epsg:4326)

use rws_waterdata::config::Settings;
use rws_waterdata::ingest::waterinfo::{list_stations, normalize_crs};
use rws_waterdata::logging::{self, LogLevel};
use rws_waterdata::measurement_types;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(measurement_type) = args.next() else {
        eprintln!("Usage: waterinfo_stations <measurement-type> [crs]");
        eprintln!("Types:");
        for t in measurement_types::MEASUREMENT_TYPES {
            eprintln!("  {:<24} {}", t.name, t.description);
        }
        std::process::exit(2);
    };
    let target = args.next().unwrap_or_else(|| "epsg:4326".to_string());

    let settings = Settings::load()?;
    // stdout carries the JSON; keep info-level chatter off it.
    let level = settings.min_log_level().max(LogLevel::Warning);
    logging::init_logger(level, settings.log_file.as_deref(), true);

    let client = settings.http_client()?;
    let mut stations = list_stations(&client, &settings, &measurement_type)?;
    normalize_crs(&mut stations, &target)?;

    println!("{}", serde_json::to_string_pretty(&stations)?);
    Ok(())
}
