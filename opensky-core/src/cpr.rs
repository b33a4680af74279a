//! Compact Position Reporting math.
//!
//! A CPR frame carries 17-bit fractions of a latitude/longitude zone. Even
//! frames use 60 latitude zones, odd frames 59. Resolving needs either an
//! even/odd pair no more than `MAX_PAIR_AGE` apart (global) or a reference
//! position within half a zone (local).

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
const NB: u32 = 17;

/// Maximum CPR value (2^17 = 131072).
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// Maximum time between even/odd frames for global decode (seconds).
pub const MAX_PAIR_AGE: f64 = 10.0;

/// Number of longitude zones at a given latitude (NL function).
///
/// Returns the number of CPR longitude zones for the latitude.
/// Ranges from 1 near poles to 59 at equator.
pub fn nl(lat: f64) -> i32 {
    if lat.abs() >= 87.0 {
        return 1;
    }

    let a = 1.0 - (std::f64::consts::PI / (2.0 * NZ)).cos();
    let b = (std::f64::consts::PI / 180.0 * lat.abs()).cos().powi(2);
    let nl_val = (2.0 * std::f64::consts::PI / (1.0 - a / b).acos()).floor() as i32;
    nl_val.max(1)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// One CPR-encoded position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CprFrame {
    pub lat: u32,
    pub lon: u32,
    pub odd: bool,
    /// Receipt time, seconds
    pub time: f64,
}

impl CprFrame {
    fn lat_norm(&self) -> f64 {
        self.lat as f64 / CPR_MAX
    }

    fn lon_norm(&self) -> f64 {
        self.lon as f64 / CPR_MAX
    }
}

/// Global CPR decode from an even/odd frame pair.
///
/// The more recent frame of the pair selects the latitude zone. Returns
/// `(latitude, longitude)` in degrees, or `None` when the pair is too far
/// apart in time or straddles a longitude zone boundary.
pub fn global_decode(even: &CprFrame, odd: &CprFrame) -> Option<(f64, f64)> {
    if (even.time - odd.time).abs() > MAX_PAIR_AGE {
        return None;
    }

    let dlat_even = 360.0 / (4.0 * NZ);
    let dlat_odd = 360.0 / (4.0 * NZ - 1.0);

    let j = (59.0 * even.lat_norm() - 60.0 * odd.lat_norm() + 0.5).floor();

    let mut lat_e = dlat_even * (modulo(j, 60.0) + even.lat_norm());
    let mut lat_o = dlat_odd * (modulo(j, 59.0) + odd.lat_norm());
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    if nl(lat_e) != nl(lat_o) {
        return None;
    }

    let use_even = even.time >= odd.time;
    let (lat, nl_val) = if use_even {
        (lat_e, nl(lat_e))
    } else {
        (lat_o, nl(lat_o))
    };
    let n_lon = if use_even { nl_val } else { nl_val - 1 }.max(1);
    let dlon = 360.0 / n_lon as f64;
    let m = (even.lon_norm() * (nl_val - 1) as f64 - odd.lon_norm() * nl_val as f64 + 0.5).floor();
    let lon_norm = if use_even {
        even.lon_norm()
    } else {
        odd.lon_norm()
    };
    let mut lon = dlon * (modulo(m, n_lon as f64) + lon_norm);
    if lon >= 180.0 {
        lon -= 360.0;
    }

    Some((round6(lat), round6(lon)))
}

/// Local CPR decode of a single frame against a reference position.
///
/// Unambiguous while the aircraft is within half a zone (~180 nm) of the
/// reference.
pub fn local_decode(frame: &CprFrame, ref_lat: f64, ref_lon: f64) -> (f64, f64) {
    let i = if frame.odd { 1.0 } else { 0.0 };
    let dlat = 360.0 / (4.0 * NZ - i);

    let j = (ref_lat / dlat).floor()
        + (modulo(ref_lat, dlat) / dlat - frame.lat_norm() + 0.5).floor();
    let mut lat = dlat * (j + frame.lat_norm());

    let n_lon = (nl(lat) - i as i32).max(1);
    let dlon = 360.0 / n_lon as f64;

    let m = (ref_lon / dlon).floor()
        + (modulo(ref_lon, dlon) / dlon - frame.lon_norm() + 0.5).floor();
    let mut lon = dlon * (m + frame.lon_norm());

    if lat > 90.0 {
        lat -= 360.0;
    }
    if lon >= 180.0 {
        lon -= 360.0;
    }

    (round6(lat), round6(lon))
}

/// Round to 6 decimal places, about 0.1 m of latitude.
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
