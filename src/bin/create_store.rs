//! Catalog Store Creation
//!
//! Creates the `opendap` schema and loads `catalogs.json` and `files.json`
//! (written by `extract_catalogs`) into it in one transaction. Refuses to
//! run against a database that already holds the schema.
//!
//! Usage:
//!   cargo run --bin create_store
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (from .env)
//!   RWS_CONFIG   - settings file (default: rijkswaterstaat.toml)

use rws_waterdata::config::{self, Settings};
use rws_waterdata::logging;
use rws_waterdata::store::{create_store, PostgresStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("📊 Catalog Store Creation");
    println!("================================\n");

    let settings = Settings::load()?;
    logging::init_logger(settings.min_log_level(), settings.log_file.as_deref(), false);

    println!("📊 Connecting to database...");
    let mut store = PostgresStore::connect(&config::database_url()?)?;
    println!("✓ Connected\n");

    println!("📋 Loading dumps from {}", settings.data_dir.display());
    let (catalogs, files) = create_store(&mut store, &settings.data_dir)?;

    println!("\n🎉 STORE CREATED");
    println!("================================");
    println!("Catalogs: {}", catalogs);
    println!("Files:    {}", files);

    Ok(())
}
