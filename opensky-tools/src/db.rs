//! SQLite research database: sensors, positions and velocities.
//!
//! The schema and every row of a run are written inside one transaction.
//! Dropping the database without [`FactSink::commit`] discards the run.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, Result as SqlResult};
use serde::Serialize;
use tracing::info;

use opensky_core::{FactSink, GeoPosition, ResolvedPosition, ResolvedVelocity, SurveillanceRecord};

const SCHEMA: &str = r#"
CREATE TABLE sensor (
    id INTEGER PRIMARY KEY NOT NULL,  -- sensor serial number
    latitude REAL,                    -- decimal degrees
    longitude REAL,                   -- decimal degrees
    altitude REAL                     -- metres
);

CREATE TABLE position (
    sensor INTEGER NOT NULL REFERENCES sensor(id),
    timeAtServer REAL NOT NULL,       -- unix timestamp
    timeAtSensor INTEGER,             -- unix timestamp
    timestamp INTEGER,                -- rolling timestamp
    latitude REAL NOT NULL,           -- decimal degrees
    longitude REAL NOT NULL,          -- decimal degrees
    altitude REAL,                    -- metres
    rawMessage TEXT NOT NULL          -- raw message hex string
);

CREATE TABLE velocity (
    sensor INTEGER NOT NULL REFERENCES sensor(id),
    timeAtServer REAL NOT NULL,
    timeAtSensor INTEGER,
    timestamp INTEGER,
    rawMessage TEXT NOT NULL,
    horizontalSpeed REAL,             -- m/s
    verticalSpeed REAL,               -- m/s
    heading REAL,                     -- clockwise degrees from north
    geoMinusBaro REAL                 -- metres
);
"#;

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DbStats {
    pub sensors: u64,
    pub positions: u64,
    pub velocities: u64,
}

pub struct Database {
    conn: Connection,
    committed: bool,
}

impl Database {
    /// Create a new database file and open the run transaction.
    ///
    /// The caller checks beforehand that `path` does not exist.
    pub fn create(path: &Path) -> SqlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(path = %path.display(), "created database");
        Self::init(conn)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> SqlResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON; BEGIN;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn,
            committed: false,
        })
    }

    pub fn stats(&self) -> SqlResult<DbStats> {
        let count = |table: &str| -> SqlResult<u64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok(n as u64)
        };
        Ok(DbStats {
            sensors: count("sensor")?,
            positions: count("position")?,
            velocities: count("velocity")?,
        })
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl FactSink for Database {
    type Error = rusqlite::Error;

    /// A new position replaces the whole stored one; `None` keeps it.
    fn upsert_sensor(&mut self, serial: i32, position: Option<&GeoPosition>) -> SqlResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO sensor (id, latitude, longitude, altitude)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    latitude = CASE WHEN excluded.latitude IS NULL
                               THEN latitude ELSE excluded.latitude END,
                    longitude = CASE WHEN excluded.latitude IS NULL
                                THEN longitude ELSE excluded.longitude END,
                    altitude = CASE WHEN excluded.latitude IS NULL
                               THEN altitude ELSE excluded.altitude END",
            )?
            .execute(params![
                serial,
                position.map(|p| p.lat),
                position.map(|p| p.lon),
                position.and_then(|p| p.alt_m),
            ])?;
        Ok(())
    }

    fn append_position(
        &mut self,
        record: &SurveillanceRecord,
        position: &ResolvedPosition,
    ) -> SqlResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO position (sensor, timeAtServer, timeAtSensor, timestamp,
                                       latitude, longitude, altitude, rawMessage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                record.sensor_serial,
                record.time_at_server,
                record.time_at_sensor,
                record.timestamp,
                position.lat,
                position.lon,
                position.altitude_m,
                record.raw_message,
            ])?;
        Ok(())
    }

    fn append_velocity(
        &mut self,
        record: &SurveillanceRecord,
        velocity: &ResolvedVelocity,
    ) -> SqlResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO velocity (sensor, timeAtServer, timeAtSensor, timestamp, rawMessage,
                                       horizontalSpeed, verticalSpeed, heading, geoMinusBaro)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?
            .execute(params![
                record.sensor_serial,
                record.time_at_server,
                record.time_at_sensor,
                record.timestamp,
                record.raw_message,
                velocity.horizontal_speed,
                velocity.vertical_speed,
                velocity.heading,
                velocity.geo_minus_baro,
            ])?;
        Ok(())
    }

    fn commit(&mut self) -> SqlResult<()> {
        if !self.committed {
            self.conn.execute_batch("COMMIT;")?;
            self.committed = true;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
