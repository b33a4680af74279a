//! `avro2sqlite`: decode archived records into the research database.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use opensky_core::config::Config;
use opensky_core::{icao_from_hex, ConvertOptions, ConvertPipeline, ConvertStats, TimeWindow};

use crate::container::{check_inputs, check_output, AvroSource};
use crate::db::{Database, DbStats};
use crate::error::{Result, ToolError};
use crate::progress::RateMeter;
use crate::report;

#[derive(Parser, Debug)]
#[command(
    name = "avro2sqlite",
    version,
    about = "Decode OpenSky Avro records into a SQLite research database"
)]
pub struct ConvertArgs {
    /// Only keep the aircraft with this ICAO 24-bit address (hex)
    #[arg(short = 'i', long = "icao24", value_name = "HEX")]
    pub icao24: Option<String>,

    /// Drop records received before this unix timestamp
    #[arg(short, long, value_name = "TS")]
    pub start: Option<f64>,

    /// Drop records received after this unix timestamp
    #[arg(short, long, value_name = "TS")]
    pub end: Option<f64>,

    /// Decode at most this many distinct aircraft
    #[arg(short = 'n', long = "max-num", value_name = "N")]
    pub max_num: Option<usize>,

    /// Config file (default: ~/.opensky-tools/config.yaml)
    #[arg(long, value_name = "PATH", env = "OPENSKY_TOOLS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also print the statistics as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Avro input file(s) followed by the output database
    #[arg(value_name = "INPUT... OUTPUT-DB", num_args = 2.., required = true)]
    pub paths: Vec<PathBuf>,
}

impl ConvertArgs {
    /// Split the positional paths into inputs and the database path.
    pub fn split_paths(&self) -> Result<(&[PathBuf], &PathBuf)> {
        match self.paths.split_last() {
            Some((db, inputs)) if !inputs.is_empty() => Ok((inputs, db)),
            _ => Err(ToolError::Precondition(
                "Output SQLite file is missing!".into(),
            )),
        }
    }

    pub fn options(&self, config: &Config) -> Result<ConvertOptions> {
        let icao = match &self.icao24 {
            Some(hex) => Some(icao_from_hex(hex).ok_or_else(|| {
                ToolError::Precondition(format!("invalid ICAO 24-bit address: {hex}"))
            })?),
            None => None,
        };
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ToolError::Precondition(format!(
                    "start ({start}) is after end ({end})"
                )));
            }
        }
        Ok(ConvertOptions {
            window: TimeWindow {
                start: self.start,
                end: self.end,
            },
            icao,
            max_aircraft: self.max_num,
            staleness_window: config.pipeline.staleness_window,
            sweep_interval: config.pipeline.sweep_interval,
            trusted_sensors: config.sensors.trusted.clone(),
        })
    }
}

/// Outcome of a conversion run.
#[derive(Debug)]
pub struct ConvertSummary {
    pub stats: ConvertStats,
    pub database: DbStats,
}

/// Run the conversion. Nothing is created unless every precondition holds.
pub fn run(args: &ConvertArgs, config: &Config) -> Result<ConvertSummary> {
    let (inputs, db_path) = args.split_paths()?;
    let options = args.options(config)?;
    check_output(db_path, "database")?;
    check_inputs(inputs)?;

    let mut db = Database::create(db_path)?;
    let mut pipeline = ConvertPipeline::new(options);
    let mut meter = RateMeter::new(config.progress.enabled, config.progress.interval);

    for path in inputs {
        for item in AvroSource::open(path)? {
            let (_, record) = item?;
            pipeline.process(&record, &mut db)?;
            meter.tick(pipeline.stats().records);
        }
    }
    meter.finish();

    let stats = pipeline.finish(&mut db)?;
    let database = db.stats()?;
    info!(
        good = stats.good_positions,
        bad = stats.bad_positions,
        contexts = stats.contexts_created,
        "conversion done"
    );
    Ok(ConvertSummary { stats, database })
}

/// Run and report.
pub fn main_with(args: &ConvertArgs, config: &Config) -> Result<()> {
    let summary = run(args, config)?;
    let table = report::convert_table(&summary.stats, &summary.database);
    let json = report::ConvertReport {
        stats: &summary.stats,
        database: &summary.database,
    };
    report::emit(&table, &json, args.json)
}
