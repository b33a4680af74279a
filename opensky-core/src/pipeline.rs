//! Convert pipeline: surveillance records in, persisted kinematic facts out.
//!
//! Records are processed strictly in source order. For each record:
//!
//! 1. Count it, and every `sweep_interval` records evict stale aircraft
//! 2. Drop it if outside the time window
//! 3. Decode the payload (failures are counted, never fatal)
//! 4. Airborne positions: cardinality cap, identity filter, resolve,
//!    plausibility check, persist if good and the sensor is trusted
//! 5. Ground-speed velocities: identity filter, convert, persist if trusted
//! 6. Everything else is ignored

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::AircraftCache;
use crate::decode::decode_hex;
use crate::filter::{FilterChain, FilterCounts, FilterReason, TimeWindow};
use crate::normalize::{Normalizer, ResolvedVelocity};
use crate::record::{GeoPosition, SurveillanceRecord};
use crate::resolver::{CprResolver, PositionResolver};
use crate::sink::FactSink;
use crate::types::{DecodedMsg, Icao, PositionMsg, SpeedType, VelocityMsg};

/// Sensor types whose facts are persisted by default.
pub const DEFAULT_TRUSTED_SENSORS: &[&str] = &["OpenSky", "Radarcape"];

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub window: TimeWindow,
    pub icao: Option<Icao>,
    pub max_aircraft: Option<usize>,
    /// Seconds without a position message before an aircraft is evicted
    pub staleness_window: f64,
    /// Records between eviction sweeps
    pub sweep_interval: u64,
    pub trusted_sensors: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            window: TimeWindow::default(),
            icao: None,
            max_aircraft: None,
            staleness_window: 3600.0,
            sweep_interval: 1_000_000,
            trusted_sensors: DEFAULT_TRUSTED_SENSORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Filtered(FilterReason),
    Malformed,
    Ignored,
    Position { good: bool, stored: bool },
    Velocity { stored: bool },
}

/// End-of-run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvertStats {
    pub records: u64,
    pub filtered: u64,
    pub filter_reasons: FilterCounts,
    pub malformed: u64,
    pub ignored: u64,
    /// Aircraft contexts created, counting re-creation after eviction
    pub contexts_created: u64,
    pub good_positions: u64,
    pub bad_positions: u64,
    pub velocities: u64,
    pub positions_written: u64,
    pub velocities_written: u64,
    pub sensor_upserts: u64,
    /// Good facts dropped because the sensor type is not trusted
    pub untrusted: u64,
    pub sweeps: u64,
    pub evicted: u64,
}

pub struct ConvertPipeline<R: PositionResolver = CprResolver> {
    options: ConvertOptions,
    filters: FilterChain,
    resolver: R,
    normalizer: Normalizer,
    cache: AircraftCache<R::State>,
    /// Last position upserted per sensor serial
    sensors: HashMap<i32, Option<GeoPosition>>,
    latest_time: Option<f64>,
    stats: ConvertStats,
}

impl ConvertPipeline<CprResolver> {
    pub fn new(options: ConvertOptions) -> Self {
        Self::with_resolver(options, CprResolver::default())
    }
}

impl<R: PositionResolver> ConvertPipeline<R> {
    pub fn with_resolver(options: ConvertOptions, resolver: R) -> Self {
        let filters = FilterChain {
            window: options.window,
            icao: options.icao,
        };
        let cache = AircraftCache::new(options.max_aircraft);
        ConvertPipeline {
            options,
            filters,
            resolver,
            normalizer: Normalizer::default(),
            cache,
            sensors: HashMap::new(),
            latest_time: None,
            stats: ConvertStats::default(),
        }
    }

    pub fn stats(&self) -> &ConvertStats {
        &self.stats
    }

    pub fn cache(&self) -> &AircraftCache<R::State> {
        &self.cache
    }

    /// Process one record. Only sink errors are returned.
    pub fn process<S: FactSink>(
        &mut self,
        record: &SurveillanceRecord,
        sink: &mut S,
    ) -> Result<RecordOutcome, S::Error> {
        self.stats.records += 1;
        if self.stats.records % self.options.sweep_interval.max(1) == 0 {
            self.sweep();
        }

        let t = record.time_at_server;
        if !self.filters.admits_time(t) {
            return Ok(self.filtered(FilterReason::TimeWindow));
        }
        self.latest_time = Some(self.latest_time.map_or(t, |latest| latest.max(t)));

        let decoded = match decode_hex(&record.raw_message, t) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(index = self.stats.records, error = %e, "skipping malformed record");
                self.stats.malformed += 1;
                return Ok(RecordOutcome::Malformed);
            }
        };

        match &decoded.msg {
            DecodedMsg::AirbornePosition(msg) => self.handle_position(record, msg, sink),
            DecodedMsg::Velocity(msg) if msg.speed_type == SpeedType::Ground => {
                self.handle_velocity(record, msg, sink)
            }
            _ => {
                self.stats.ignored += 1;
                Ok(RecordOutcome::Ignored)
            }
        }
    }

    /// Commit the sink and hand back the final statistics.
    pub fn finish<S: FactSink>(mut self, sink: &mut S) -> Result<ConvertStats, S::Error> {
        sink.commit()?;
        self.stats.contexts_created = self.cache.created();
        info!(
            records = self.stats.records,
            positions = self.stats.positions_written,
            velocities = self.stats.velocities_written,
            "conversion committed"
        );
        Ok(self.stats)
    }

    fn sweep(&mut self) {
        let Some(now) = self.latest_time else {
            return;
        };
        let resolver = &self.resolver;
        let evicted = self
            .cache
            .sweep(now, self.options.staleness_window, |state| resolver.reset(state));
        self.stats.sweeps += 1;
        self.stats.evicted += evicted as u64;
        info!(
            evicted,
            live = self.cache.len(),
            records = self.stats.records,
            "aircraft cache swept"
        );
    }

    fn filtered(&mut self, reason: FilterReason) -> RecordOutcome {
        self.stats.filtered += 1;
        self.stats.filter_reasons.record(reason);
        RecordOutcome::Filtered(reason)
    }

    fn is_trusted(&self, record: &SurveillanceRecord) -> bool {
        self.options
            .trusted_sensors
            .iter()
            .any(|t| *t == record.sensor_type)
    }

    fn handle_position<S: FactSink>(
        &mut self,
        record: &SurveillanceRecord,
        msg: &PositionMsg,
        sink: &mut S,
    ) -> Result<RecordOutcome, S::Error> {
        if !self.cache.would_admit(&msg.icao) {
            return Ok(self.filtered(FilterReason::MaxAircraft));
        }
        if !self.filters.admits_identity(&msg.icao) {
            return Ok(self.filtered(FilterReason::Identity));
        }

        let t = record.time_at_server;
        let Some(ctx) = self.cache.get_or_create(msg.icao, t) else {
            return Ok(self.filtered(FilterReason::MaxAircraft));
        };
        let reference = record.sensor_position();

        let resolved = self
            .resolver
            .resolve(t, msg, reference.as_ref(), &mut ctx.state)
            .and_then(|mut pos| {
                self.normalizer
                    .assess(&mut pos, t, reference.as_ref(), ctx.last_good.as_ref())
                    .then_some(pos)
            });

        let Some(pos) = resolved else {
            self.stats.bad_positions += 1;
            return Ok(RecordOutcome::Position {
                good: false,
                stored: false,
            });
        };
        self.resolver.accept(t, &pos, &mut ctx.state);
        ctx.last_good = Some((t, pos));
        self.stats.good_positions += 1;

        if !self.is_trusted(record) {
            self.stats.untrusted += 1;
            return Ok(RecordOutcome::Position {
                good: true,
                stored: false,
            });
        }

        self.ensure_sensor(record, reference, sink)?;
        sink.append_position(record, &pos)?;
        self.stats.positions_written += 1;
        Ok(RecordOutcome::Position {
            good: true,
            stored: true,
        })
    }

    fn handle_velocity<S: FactSink>(
        &mut self,
        record: &SurveillanceRecord,
        msg: &VelocityMsg,
        sink: &mut S,
    ) -> Result<RecordOutcome, S::Error> {
        if !self.filters.admits_identity(&msg.icao) {
            return Ok(self.filtered(FilterReason::Identity));
        }

        let velocity = ResolvedVelocity::from(msg);
        self.stats.velocities += 1;

        if !self.is_trusted(record) {
            self.stats.untrusted += 1;
            return Ok(RecordOutcome::Velocity { stored: false });
        }

        self.ensure_sensor(record, record.sensor_position(), sink)?;
        sink.append_velocity(record, &velocity)?;
        self.stats.velocities_written += 1;
        Ok(RecordOutcome::Velocity { stored: true })
    }

    /// Upsert the record's sensor unless the same position was already written.
    fn ensure_sensor<S: FactSink>(
        &mut self,
        record: &SurveillanceRecord,
        position: Option<GeoPosition>,
        sink: &mut S,
    ) -> Result<(), S::Error> {
        let serial = record.sensor_serial;
        if self.sensors.get(&serial) == Some(&position) {
            return Ok(());
        }
        sink.upsert_sensor(serial, position.as_ref())?;
        self.sensors.insert(serial, position);
        self.stats.sensor_upserts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc24_payload;
    use crate::normalize::ResolvedPosition;
    use crate::types::hex_encode;

    const ABCDEF: Icao = [0xAB, 0xCD, 0xEF];
    /// ME field of the even position frame 8D40621D58C382D690C8AC2863A7
    const EVEN_ME: u64 = 0x58C382D690C8AC;

    fn df17_hex(icao: Icao, me: u64) -> String {
        let mut data = vec![0x8D, icao[0], icao[1], icao[2]];
        data.extend_from_slice(&me.to_be_bytes()[1..8]);
        data.extend_from_slice(&[0, 0, 0]);
        let crc = crc24_payload(&data);
        data[11] = (crc >> 16) as u8;
        data[12] = (crc >> 8) as u8;
        data[13] = crc as u8;
        hex_encode(&data)
    }

    /// Ground velocity, 250 kt east, no vertical rate.
    fn velocity_hex(icao: Icao) -> String {
        df17_hex(icao, (19 << 51) | (1 << 48) | (251 << 32) | (1 << 21))
    }

    fn record(time: f64, raw: &str) -> SurveillanceRecord {
        SurveillanceRecord {
            time_at_server: time,
            time_at_sensor: Some(123),
            timestamp: None,
            sensor_serial: 7,
            sensor_type: "OpenSky".into(),
            sensor_latitude: Some(52.25),
            sensor_longitude: Some(3.92),
            sensor_altitude: Some(10.0),
            raw_message: raw.into(),
        }
    }

    #[derive(Default)]
    struct MemorySink {
        sensors: Vec<(i32, Option<GeoPosition>)>,
        positions: Vec<(f64, ResolvedPosition)>,
        velocities: Vec<(f64, ResolvedVelocity)>,
        committed: bool,
    }

    impl MemorySink {
        fn sensor(&self, serial: i32) -> Option<GeoPosition> {
            self.sensors
                .iter()
                .rev()
                .find(|(s, pos)| *s == serial && pos.is_some())
                .and_then(|(_, pos)| *pos)
        }
    }

    impl FactSink for MemorySink {
        type Error = std::convert::Infallible;

        fn upsert_sensor(
            &mut self,
            serial: i32,
            position: Option<&GeoPosition>,
        ) -> Result<(), Self::Error> {
            self.sensors.push((serial, position.copied()));
            Ok(())
        }

        fn append_position(
            &mut self,
            record: &SurveillanceRecord,
            position: &ResolvedPosition,
        ) -> Result<(), Self::Error> {
            assert!(self.sensors.iter().any(|(s, _)| *s == record.sensor_serial));
            self.positions.push((record.time_at_server, *position));
            Ok(())
        }

        fn append_velocity(
            &mut self,
            record: &SurveillanceRecord,
            velocity: &ResolvedVelocity,
        ) -> Result<(), Self::Error> {
            assert!(self.sensors.iter().any(|(s, _)| *s == record.sensor_serial));
            self.velocities.push((record.time_at_server, *velocity));
            Ok(())
        }

        fn commit(&mut self) -> Result<(), Self::Error> {
            self.committed = true;
            Ok(())
        }
    }

    fn run(pipeline: &mut ConvertPipeline, sink: &mut MemorySink, records: &[SurveillanceRecord]) {
        for rec in records {
            pipeline.process(rec, sink).unwrap();
        }
    }

    #[test]
    fn test_position_velocity_and_ignored() {
        let records = [
            record(1000.0, &df17_hex(ABCDEF, EVEN_ME)),
            record(1001.0, &velocity_hex(ABCDEF)),
            record(1002.0, "8D4840D6202CC371C32CE0576098"),
        ];
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        run(&mut pipeline, &mut sink, &records);
        let stats = pipeline.finish(&mut sink).unwrap();

        assert!(sink.committed);
        assert_eq!(sink.sensors.len(), 1);
        assert_eq!(sink.positions.len(), 1);
        assert_eq!(sink.velocities.len(), 1);

        let (_, pos) = sink.positions[0];
        assert!(pos.reasonable);
        assert!((pos.lat - 52.2572).abs() < 0.01);
        assert!((pos.lon - 3.9194).abs() < 0.01);

        let (_, vel) = sink.velocities[0];
        assert!((vel.horizontal_speed.unwrap() - 128.6).abs() < 0.05);
        assert_eq!(vel.vertical_speed, None);

        assert_eq!(stats.good_positions, 1);
        assert_eq!(stats.bad_positions, 0);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.contexts_created, 1);
    }

    #[test]
    fn test_time_window_filters_before_decode() {
        let options = ConvertOptions {
            window: TimeWindow {
                start: Some(100.0),
                end: Some(200.0),
            },
            ..Default::default()
        };
        let mut pipeline = ConvertPipeline::new(options);
        let mut sink = MemorySink::default();

        // A garbage payload outside the window is never decoded
        let outcome = pipeline.process(&record(50.0, "zz"), &mut sink).unwrap();
        assert_eq!(outcome, RecordOutcome::Filtered(FilterReason::TimeWindow));
        let outcome = pipeline
            .process(&record(50.0, &df17_hex(ABCDEF, EVEN_ME)), &mut sink)
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Filtered(FilterReason::TimeWindow));

        let stats = pipeline.finish(&mut sink).unwrap();
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.filter_reasons.time_window, 2);
        assert_eq!(stats.malformed, 0);
        assert!(sink.sensors.is_empty());
        assert!(sink.positions.is_empty());
        assert!(sink.velocities.is_empty());
    }

    #[test]
    fn test_identity_filter() {
        let options = ConvertOptions {
            icao: Some([0x11, 0x22, 0x33]),
            ..Default::default()
        };
        let mut pipeline = ConvertPipeline::new(options);
        let mut sink = MemorySink::default();
        run(
            &mut pipeline,
            &mut sink,
            &[
                record(1.0, &df17_hex(ABCDEF, EVEN_ME)),
                record(2.0, &velocity_hex(ABCDEF)),
                record(3.0, &velocity_hex([0x11, 0x22, 0x33])),
            ],
        );
        assert_eq!(pipeline.stats().filter_reasons.identity, 2);
        assert_eq!(sink.velocities.len(), 1);
        assert!(sink.positions.is_empty());
        assert!(pipeline.cache().is_empty());
    }

    #[test]
    fn test_max_aircraft_cap() {
        let options = ConvertOptions {
            max_aircraft: Some(1),
            ..Default::default()
        };
        let mut pipeline = ConvertPipeline::new(options);
        let mut sink = MemorySink::default();
        let other: Icao = [0x12, 0x34, 0x56];
        run(
            &mut pipeline,
            &mut sink,
            &[
                record(1.0, &df17_hex(ABCDEF, EVEN_ME)),
                record(2.0, &df17_hex(other, EVEN_ME)),
                record(3.0, &df17_hex(ABCDEF, EVEN_ME)),
            ],
        );
        let stats = pipeline.stats();
        assert_eq!(stats.filter_reasons.max_aircraft, 1);
        assert_eq!(stats.good_positions, 2);
        assert_eq!(pipeline.cache().created(), 1);
    }

    #[test]
    fn test_sweep_bounds_cache() {
        let options = ConvertOptions {
            staleness_window: 100.0,
            sweep_interval: 10,
            ..Default::default()
        };
        let mut pipeline = ConvertPipeline::new(options);
        let mut sink = MemorySink::default();
        for i in 0..100u32 {
            let icao = [0x10, 0, i as u8];
            let rec = record(i as f64 * 60.0, &df17_hex(icao, EVEN_ME));
            pipeline.process(&rec, &mut sink).unwrap();
            // live contexts never exceed what the window can hold plus one sweep interval
            assert!(pipeline.cache().len() <= 12, "live {}", pipeline.cache().len());
        }
        let stats = pipeline.stats();
        assert_eq!(stats.sweeps, 10);
        assert!(stats.evicted > 0);
        assert!(pipeline.cache().capacity() <= 12);
    }

    #[test]
    fn test_contexts_created_counts_recreation() {
        let options = ConvertOptions {
            staleness_window: 100.0,
            sweep_interval: 2,
            ..Default::default()
        };
        let mut pipeline = ConvertPipeline::new(options);
        let mut sink = MemorySink::default();
        let other: Icao = [0x12, 0x34, 0x56];
        run(
            &mut pipeline,
            &mut sink,
            &[
                record(0.0, &df17_hex(ABCDEF, EVEN_ME)),
                record(500.0, &df17_hex(other, EVEN_ME)),
                record(600.0, &df17_hex(other, EVEN_ME)),
                // sweep before this record evicts ABCDEF
                record(700.0, &df17_hex(ABCDEF, EVEN_ME)),
            ],
        );
        let stats = pipeline.finish(&mut sink).unwrap();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.contexts_created, 3);
    }

    #[test]
    fn test_implausible_fix_is_not_a_reference() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let frame = df17_hex(ABCDEF, EVEN_ME);

        let good = record(0.0, &frame);
        // a far-away sensor decodes the same frame ~1300 km south: rejected as a jump
        let mut far = record(1.0, &frame);
        far.sensor_latitude = Some(40.0);
        // no sensor position: only the aircraft's accepted fix can serve
        let mut blind = record(2.0, &frame);
        blind.sensor_latitude = None;
        blind.sensor_longitude = None;

        pipeline.process(&good, &mut sink).unwrap();
        let rejected = pipeline.process(&far, &mut sink).unwrap();
        assert_eq!(
            rejected,
            RecordOutcome::Position {
                good: false,
                stored: false
            }
        );
        let outcome = pipeline.process(&blind, &mut sink).unwrap();
        assert_eq!(
            outcome,
            RecordOutcome::Position {
                good: true,
                stored: true
            }
        );
        let (_, pos) = sink.positions[1];
        assert!((pos.lat - 52.2572).abs() < 0.01);
    }

    #[test]
    fn test_sensor_upsert_last_position_wins() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let mut records = Vec::new();
        for (i, lat) in [52.25, 52.26, 52.27].into_iter().enumerate() {
            let mut rec = record(i as f64, &velocity_hex(ABCDEF));
            rec.sensor_latitude = Some(lat);
            records.push(rec);
        }
        // repeats of an unchanged position are not re-written
        records.push(records[2].clone());
        run(&mut pipeline, &mut sink, &records);

        assert_eq!(pipeline.stats().sensor_upserts, 3);
        assert_eq!(sink.sensor(7).unwrap().lat, 52.27);
    }

    #[test]
    fn test_untrusted_sensor_not_persisted() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let mut rec = record(1.0, &df17_hex(ABCDEF, EVEN_ME));
        rec.sensor_type = "dump1090".into();
        let outcome = pipeline.process(&rec, &mut sink).unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Position {
                good: true,
                stored: false
            }
        );
        assert_eq!(pipeline.stats().untrusted, 1);
        assert!(sink.sensors.is_empty());
    }

    #[test]
    fn test_unresolvable_position_is_bad() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let mut rec = record(1.0, &df17_hex(ABCDEF, EVEN_ME));
        rec.sensor_latitude = None;
        let outcome = pipeline.process(&rec, &mut sink).unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Position {
                good: false,
                stored: false
            }
        );
        assert_eq!(pipeline.stats().bad_positions, 1);
        assert!(sink.positions.is_empty());
    }

    #[test]
    fn test_malformed_record_is_isolated() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let mut corrupted = df17_hex(ABCDEF, EVEN_ME);
        corrupted.truncate(20);

        assert_eq!(
            pipeline.process(&record(1.0, &corrupted), &mut sink).unwrap(),
            RecordOutcome::Malformed
        );
        let outcome = pipeline
            .process(&record(2.0, &velocity_hex(ABCDEF)), &mut sink)
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Velocity { stored: true });
        assert_eq!(pipeline.stats().malformed, 1);
        assert_eq!(sink.velocities.len(), 1);
    }

    #[test]
    fn test_airspeed_and_surface_are_ignored() {
        let mut pipeline = ConvertPipeline::new(ConvertOptions::default());
        let mut sink = MemorySink::default();
        let airspeed = df17_hex(ABCDEF, (19 << 51) | (3 << 48) | (302 << 21));
        let surface = df17_hex(ABCDEF, (7 << 51) | (93000 << 17) | 51372);
        run(
            &mut pipeline,
            &mut sink,
            &[record(1.0, &airspeed), record(2.0, &surface)],
        );
        assert_eq!(pipeline.stats().ignored, 2);
        assert!(pipeline.cache().is_empty());
    }
}
