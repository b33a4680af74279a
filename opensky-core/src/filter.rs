//! Record filters, cheapest first.
//!
//! - Time window on the server receipt time
//! - Single-aircraft identity filter
//! - Message-kind filters for extraction
//!
//! The cardinality cap lives in [`crate::cache::AircraftCache`] because it
//! needs the admitted-identity set.

use serde::Serialize;

use crate::types::{Decoded, Icao, MessageKind};

/// Why a record was dropped before reaching the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterReason {
    TimeWindow,
    MaxAircraft,
    Identity,
    Kind,
    /// Not an ADS-B extended squitter
    NotAdsb,
    /// Payload could not be decoded
    Malformed,
}

/// Inclusive `[start, end]` window; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimeWindow {
    pub fn contains(&self, t: f64) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

/// Time window and identity filters of the convert pipeline.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    pub window: TimeWindow,
    pub icao: Option<Icao>,
}

impl FilterChain {
    pub fn admits_time(&self, t: f64) -> bool {
        self.window.contains(t)
    }

    pub fn admits_identity(&self, icao: &Icao) -> bool {
        self.icao.map_or(true, |want| want == *icao)
    }
}

/// Message-kind exclusions of the extract pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindFilter {
    pub no_position: bool,
    pub no_velocity: bool,
    pub no_identification: bool,
    /// Drop emergency, status and TCAS messages
    pub no_misc: bool,
}

impl KindFilter {
    /// `None` when the message should be kept.
    pub fn rejects(&self, decoded: &Decoded) -> Option<FilterReason> {
        if !decoded.is_adsb() {
            return Some(FilterReason::NotAdsb);
        }
        let excluded = match decoded.kind() {
            MessageKind::AirbornePosition | MessageKind::SurfacePosition => self.no_position,
            MessageKind::Velocity | MessageKind::Airspeed => self.no_velocity,
            MessageKind::Identification => self.no_identification,
            MessageKind::Emergency | MessageKind::Status | MessageKind::Tcas => self.no_misc,
            MessageKind::ExtendedSquitter | MessageKind::Other => {
                return Some(FilterReason::NotAdsb)
            }
        };
        excluded.then_some(FilterReason::Kind)
    }
}

/// Per-reason filter counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterCounts {
    pub time_window: u64,
    pub max_aircraft: u64,
    pub identity: u64,
    pub kind: u64,
    pub not_adsb: u64,
    pub malformed: u64,
}

impl FilterCounts {
    pub fn record(&mut self, reason: FilterReason) {
        let counter = match reason {
            FilterReason::TimeWindow => &mut self.time_window,
            FilterReason::MaxAircraft => &mut self.max_aircraft,
            FilterReason::Identity => &mut self.identity,
            FilterReason::Kind => &mut self.kind,
            FilterReason::NotAdsb => &mut self.not_adsb,
            FilterReason::Malformed => &mut self.malformed,
        };
        *counter += 1;
    }

    pub fn total(&self) -> u64 {
        self.time_window + self.max_aircraft + self.identity + self.kind + self.not_adsb + self.malformed
    }
}
