//! Waterbase Catalog Extraction
//!
//! Walks every catalog of the Waterbase archive on the Deltares THREDDS
//! server, reads the station metadata of each netCDF file over OPeNDAP and
//! writes `catalogs.json` and `files.json` to the configured data directory.
//!
//! Usage:
//!   cargo run --features netcdf --bin extract_catalogs
//!
//! Environment:
//!   RWS_CONFIG - settings file (default: rijkswaterstaat.toml)

use rws_waterdata::config::Settings;
use rws_waterdata::ingest::extract::{write_outputs, Extractor};
use rws_waterdata::ingest::grid::GridReader;
use rws_waterdata::ingest::netcdf_source::NetcdfOpener;
use rws_waterdata::logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🌊 Waterbase Catalog Extraction");
    println!("================================\n");

    let settings = Settings::load()?;
    logging::init_logger(settings.min_log_level(), settings.log_file.as_deref(), false);

    let client = settings.http_client()?;
    let reader = GridReader::new(NetcdfOpener, &settings)?;

    println!("📋 Scraping {}\n", settings.catalog_url);
    let extraction = Extractor::new(&client, &reader, &settings).extract_all()?;
    let (catalogs_path, files_path) = write_outputs(&extraction, &settings.data_dir)?;

    println!("\n🎉 EXTRACTION COMPLETE");
    println!("================================");
    println!("Catalogs:      {}", extraction.catalogs.len());
    println!("Files:         {}", extraction.files.len());
    println!("Files skipped: {}", extraction.skipped.len());
    println!("Written:       {}", catalogs_path.display());
    println!("               {}", files_path.display());

    Ok(())
}
