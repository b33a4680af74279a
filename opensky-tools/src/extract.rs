//! `extract-adsb`: copy the ADS-B records of one or more archives into a
//! single output container.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use opensky_core::config::Config;
use opensky_core::{ExtractOutcome, ExtractStats, Extractor, KindFilter};

use crate::container::{check_inputs, check_output, AvroSink, AvroSource};
use crate::error::Result;
use crate::progress::RateMeter;
use crate::report;

#[derive(Parser, Debug)]
#[command(
    name = "extract-adsb",
    version,
    about = "Filter OpenSky Avro files down to ADS-B messages"
)]
pub struct ExtractArgs {
    /// Output Avro file
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Drop airborne and surface position messages
    #[arg(short = 'p', long)]
    pub no_position: bool,

    /// Drop velocity messages
    #[arg(short = 'v', long)]
    pub no_velocity: bool,

    /// Drop identification messages
    #[arg(short = 'i', long = "no-id")]
    pub no_id: bool,

    /// Drop emergency, status and TCAS messages
    #[arg(short = 'b', long)]
    pub basic_only: bool,

    /// Config file (default: ~/.opensky-tools/config.yaml)
    #[arg(long, value_name = "PATH", env = "OPENSKY_TOOLS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also print the statistics as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Avro input files
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,
}

impl ExtractArgs {
    pub fn kind_filter(&self) -> KindFilter {
        KindFilter {
            no_position: self.no_position,
            no_velocity: self.no_velocity,
            no_identification: self.no_id,
            no_misc: self.basic_only,
        }
    }
}

/// Run the extraction. The output uses the first input's writer schema.
pub fn run(args: &ExtractArgs, config: &Config) -> Result<ExtractStats> {
    check_output(&args.output, "file")?;
    check_inputs(&args.inputs)?;

    let mut sources = args
        .inputs
        .iter()
        .map(|path| AvroSource::open(path))
        .collect::<Result<Vec<_>>>()?;
    let schema = match sources.first() {
        Some(first) => first.schema().clone(),
        None => return Ok(ExtractStats::default()),
    };

    let mut sink = AvroSink::create(&args.output, &schema)?;
    let mut extractor = Extractor::new(args.kind_filter());
    let mut meter = RateMeter::new(config.progress.enabled, config.progress.interval);

    for source in sources.iter_mut() {
        extractor.begin_file(source.path().display().to_string());
        for item in source.by_ref() {
            let (value, record) = item?;
            if extractor.process(&record.raw_message, record.time_at_server) == ExtractOutcome::Keep
            {
                sink.append(value)?;
            }
            meter.tick(extractor.stats().read);
        }
    }
    meter.finish();
    sink.finish()?;

    let stats = extractor.into_stats();
    info!(
        read = stats.read,
        written = stats.written,
        filtered = stats.filtered,
        "extraction done"
    );
    Ok(stats)
}

/// Run and report.
pub fn main_with(args: &ExtractArgs, config: &Config) -> Result<()> {
    let stats = run(args, config)?;
    report::emit(&report::extract_table(&stats), &stats, args.json)
}
