//! Stateful position resolution.
//!
//! The pipeline sees the resolver only through [`PositionResolver`]; the
//! per-aircraft `State` lives in the aircraft cache and is handed back on
//! every call for the same aircraft.

use crate::cpr::{self, CprFrame};
use crate::normalize::{ResolvedPosition, FT_TO_M};
use crate::record::GeoPosition;
use crate::types::PositionMsg;

pub trait PositionResolver {
    type State: Default;

    /// Resolve an absolute position from a CPR position message.
    ///
    /// `time` is the record's receipt time in seconds. `reference` is the
    /// receiving sensor's position when known.
    fn resolve(
        &self,
        time: f64,
        msg: &PositionMsg,
        reference: Option<&GeoPosition>,
        state: &mut Self::State,
    ) -> Option<ResolvedPosition>;

    /// Record a resolved position that passed the plausibility checks.
    ///
    /// Only accepted positions may serve as a later decoding reference.
    fn accept(&self, time: f64, position: &ResolvedPosition, state: &mut Self::State);

    /// Return `state` to its initial condition so the slot can be reused.
    fn reset(&self, state: &mut Self::State);
}

/// Per-aircraft CPR history.
#[derive(Debug, Clone, Default)]
pub struct CprState {
    even: Option<CprFrame>,
    odd: Option<CprFrame>,
    /// (time, lat, lon) of the last accepted position
    last: Option<(f64, f64, f64)>,
}

/// Airborne CPR resolver: global decode from even/odd pairs, local decode
/// against a recent own position or the sensor otherwise.
#[derive(Debug, Clone)]
pub struct CprResolver {
    /// Maximum age of the aircraft's own position to serve as a local reference
    pub max_reference_age: f64,
}

impl Default for CprResolver {
    fn default() -> Self {
        CprResolver {
            max_reference_age: 600.0,
        }
    }
}

impl CprResolver {
    fn local_reference(
        &self,
        time: f64,
        state: &CprState,
        sensor: Option<&GeoPosition>,
    ) -> Option<(f64, f64)> {
        match state.last {
            Some((t, lat, lon)) if time - t <= self.max_reference_age => Some((lat, lon)),
            _ => sensor.map(|s| (s.lat, s.lon)),
        }
    }
}

impl PositionResolver for CprResolver {
    type State = CprState;

    fn resolve(
        &self,
        time: f64,
        msg: &PositionMsg,
        reference: Option<&GeoPosition>,
        state: &mut CprState,
    ) -> Option<ResolvedPosition> {
        if msg.is_surface() {
            return None;
        }

        let frame = CprFrame {
            lat: msg.cpr_lat,
            lon: msg.cpr_lon,
            odd: msg.cpr_odd,
            time,
        };
        if frame.odd {
            state.odd = Some(frame);
        } else {
            state.even = Some(frame);
        }

        let global = match (&state.even, &state.odd) {
            (Some(even), Some(odd)) => cpr::global_decode(even, odd),
            _ => None,
        };
        let (lat, lon) = match global {
            Some(pos) => pos,
            None => {
                let (ref_lat, ref_lon) = self.local_reference(time, state, reference)?;
                cpr::local_decode(&frame, ref_lat, ref_lon)
            }
        };

        let altitude_m = msg.altitude_ft.map(|ft| ft as f64 * FT_TO_M);
        Some(ResolvedPosition::unchecked(lat, lon, altitude_m))
    }

    fn accept(&self, time: f64, position: &ResolvedPosition, state: &mut CprState) {
        state.last = Some((time, position.lat, position.lon));
    }

    fn reset(&self, state: &mut CprState) {
        *state = CprState::default();
    }
}
