//! Unit conversion and plausibility checks for resolved kinematics.
//!
//! Native ADS-B units (knots, feet, feet per minute) are converted to SI.
//! Resolved positions are checked against the globe, the altitude envelope,
//! the receiving sensor's range and the aircraft's previous good position.

use serde::Serialize;

use crate::record::GeoPosition;
use crate::types::VelocityMsg;

pub const KNOTS_TO_MPS: f64 = 0.514444;
pub const FPM_TO_MPS: f64 = 0.00508;
pub const FT_TO_M: f64 = 0.3048;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// A position produced by the resolver. `reasonable` is set by [`Normalizer::assess`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedPosition {
    pub lat: f64,
    pub lon: f64,
    /// Metres
    pub altitude_m: Option<f64>,
    pub reasonable: bool,
}

impl ResolvedPosition {
    /// A freshly resolved position that has not been checked yet.
    pub fn unchecked(lat: f64, lon: f64, altitude_m: Option<f64>) -> Self {
        ResolvedPosition {
            lat,
            lon,
            altitude_m,
            reasonable: false,
        }
    }
}

/// Velocity in SI units. Every field is independently optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResolvedVelocity {
    /// m/s
    pub horizontal_speed: Option<f64>,
    /// m/s, positive climbing
    pub vertical_speed: Option<f64>,
    /// Degrees clockwise from true north
    pub heading: Option<f64>,
    /// Geometric minus barometric altitude, metres
    pub geo_minus_baro: Option<f64>,
}

impl From<&VelocityMsg> for ResolvedVelocity {
    fn from(msg: &VelocityMsg) -> Self {
        ResolvedVelocity {
            horizontal_speed: msg.speed_kts.map(|kts| kts * KNOTS_TO_MPS),
            vertical_speed: msg.vertical_rate_fpm.map(|fpm| fpm as f64 * FPM_TO_MPS),
            heading: msg.heading_deg,
            geo_minus_baro: msg.geo_minus_baro_ft.map(|ft| ft as f64 * FT_TO_M),
        }
    }
}

/// Plausibility limits for resolved positions.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
    /// Maximum distance from the receiving sensor
    pub max_range_m: f64,
    /// Maximum ground speed between two good positions
    pub max_speed_mps: f64,
    /// Distance always allowed between two good positions
    pub jump_slack_m: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            min_altitude_m: -1000.0 * FT_TO_M,
            max_altitude_m: 126_750.0 * FT_TO_M,
            max_range_m: 600_000.0,
            max_speed_mps: 700.0,
            jump_slack_m: 2_000.0,
        }
    }
}

impl Normalizer {
    /// Set `pos.reasonable` and return it.
    ///
    /// `previous` is the aircraft's last good position and its time.
    pub fn assess(
        &self,
        pos: &mut ResolvedPosition,
        time: f64,
        sensor: Option<&GeoPosition>,
        previous: Option<&(f64, ResolvedPosition)>,
    ) -> bool {
        pos.reasonable = self.is_reasonable(pos, time, sensor, previous);
        pos.reasonable
    }

    fn is_reasonable(
        &self,
        pos: &ResolvedPosition,
        time: f64,
        sensor: Option<&GeoPosition>,
        previous: Option<&(f64, ResolvedPosition)>,
    ) -> bool {
        if !(-90.0..=90.0).contains(&pos.lat) || !(-180.0..=180.0).contains(&pos.lon) {
            return false;
        }
        if let Some(alt) = pos.altitude_m {
            if alt < self.min_altitude_m || alt > self.max_altitude_m {
                return false;
            }
        }
        if let Some(sensor) = sensor {
            if haversine_m(sensor.lat, sensor.lon, pos.lat, pos.lon) > self.max_range_m {
                return false;
            }
        }
        if let Some((prev_time, prev)) = previous {
            let dt = (time - prev_time).abs();
            let travelled = haversine_m(prev.lat, prev.lon, pos.lat, pos.lon);
            if travelled > self.jump_slack_m + self.max_speed_mps * dt {
                return false;
            }
        }
        true
    }
}
