//! Batch tools over archived OpenSky Mode S records.
//!
//! `avro2sqlite` decodes records into a SQLite research database and
//! `extract-adsb` filters archives down to ADS-B messages.

pub mod container;
pub mod convert;
pub mod db;
pub mod error;
pub mod extract;
pub mod logging;
pub mod progress;
pub mod report;

pub use error::{Result, ToolError};

use std::path::Path;

use opensky_core::config::{self, Config};

/// Config from an explicit path, or the default location.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(config::load_config_from(path)?),
        None => Ok(config::load_config()),
    }
}

/// Print the error and exit non-zero. Used by both binaries.
pub fn fail(err: ToolError) -> ! {
    tracing::error!("{err}");
    eprintln!("Error: {err}");
    std::process::exit(1);
}
