//! End-of-run statistics: a table on stderr, optionally JSON on stdout.

use comfy_table::{Cell, Table};
use serde::Serialize;

use opensky_core::{ConvertStats, ExtractStats};

use crate::db::DbStats;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct ConvertReport<'a> {
    pub stats: &'a ConvertStats,
    pub database: &'a DbStats,
}

fn row(table: &mut Table, label: &str, value: u64) {
    table.add_row(vec![Cell::new(label), Cell::new(value)]);
}

pub fn convert_table(stats: &ConvertStats, db: &DbStats) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Convert", "Count"]);

    row(&mut table, "Records", stats.records);
    row(&mut table, "Filtered", stats.filtered);
    row(&mut table, "  time window", stats.filter_reasons.time_window);
    row(&mut table, "  max aircraft", stats.filter_reasons.max_aircraft);
    row(&mut table, "  icao24", stats.filter_reasons.identity);
    row(&mut table, "Malformed", stats.malformed);
    row(&mut table, "Ignored", stats.ignored);
    row(&mut table, "Contexts created", stats.contexts_created);
    row(&mut table, "Good positions", stats.good_positions);
    row(&mut table, "Bad positions", stats.bad_positions);
    row(&mut table, "Velocities", stats.velocities);
    row(&mut table, "Untrusted sensor", stats.untrusted);
    row(&mut table, "Cache sweeps", stats.sweeps);
    row(&mut table, "Evicted", stats.evicted);
    row(&mut table, "Sensor rows", db.sensors);
    row(&mut table, "Position rows", db.positions);
    row(&mut table, "Velocity rows", db.velocities);
    table
}

pub fn extract_table(stats: &ExtractStats) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Extract", "Count"]);

    for file in &stats.files {
        row(&mut table, &file.path, file.records);
    }
    row(&mut table, "Read", stats.read);
    row(&mut table, "Written", stats.written);
    row(&mut table, "Filtered", stats.filtered);
    row(&mut table, "  malformed", stats.malformed);
    row(&mut table, "  not ADS-B", stats.filter_reasons.not_adsb);
    row(&mut table, "  by kind", stats.filter_reasons.kind);
    table
}

/// Print the table to stderr and, if asked, `value` as one JSON line on stdout.
pub fn emit<T: Serialize>(table: &Table, value: &T, json: bool) -> Result<()> {
    eprintln!();
    eprintln!("{table}");
    if json {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
