//! Decode Mode S frames into typed aircraft messages.
//!
//! - DF17/18 TC 1-4:   Aircraft identification (callsign)
//! - DF17/18 TC 5-8:   Surface position
//! - DF17/18 TC 9-18:  Airborne position (barometric altitude)
//! - DF17/18 TC 19:    Airborne velocity (ground speed or air speed)
//! - DF17/18 TC 20-22: Airborne position (GNSS height)
//! - DF17/18 TC 28:    Emergency status / TCAS RA broadcast
//! - DF17/18 TC 29/31: Target state and operational status
//! - DF0/4/16/20:      Altitude replies
//! - DF5/21:           Identity replies (squawk)
//! - DF11:             All-call reply

use crate::frame::{parse_frame, ModeFrame};
use crate::types::*;

// ---------------------------------------------------------------------------
// Altitude decoding
// ---------------------------------------------------------------------------

/// Decode 12-bit altitude code from DF17 airborne position.
///
/// The Q-bit (bit 4) selects the encoding mode:
/// - Q=1: 25-ft resolution
/// - Q=0: 100-ft Gillham gray code
pub fn decode_altitude(alt_code: u32) -> Option<i32> {
    if alt_code == 0 {
        return None;
    }

    let q_bit = (alt_code >> 4) & 1;

    if q_bit == 1 {
        let n = ((alt_code >> 5) << 4) | (alt_code & 0x0F);
        Some(n as i32 * 25 - 1000)
    } else {
        decode_gillham_altitude(alt_code)
    }
}

/// Decode 100-ft Gillham gray code altitude.
fn decode_gillham_altitude(alt_code: u32) -> Option<i32> {
    let c1 = (alt_code >> 12) & 1;
    let a1 = (alt_code >> 11) & 1;
    let c2 = (alt_code >> 10) & 1;
    let a2 = (alt_code >> 9) & 1;
    let c4 = (alt_code >> 8) & 1;
    let a4 = (alt_code >> 7) & 1;
    let b1 = (alt_code >> 5) & 1;
    let b2 = (alt_code >> 3) & 1;
    let b4 = (alt_code >> 1) & 1;

    // 100-ft step from the C digit (Gray code)
    let mut c_bin = c4 * 4 + c2 * 2 + c1;
    c_bin ^= c_bin >> 2;
    c_bin ^= c_bin >> 1;

    if c_bin == 0 || c_bin >= 6 {
        return None;
    }

    // 500-ft step from the A and B digits (Gray code)
    let mut ab_bin = (a4 * 4 + a2 * 2 + a1) << 3 | (b4 * 4 + b2 * 2 + b1);
    ab_bin ^= ab_bin >> 4;
    ab_bin ^= ab_bin >> 2;
    ab_bin ^= ab_bin >> 1;

    let altitude = ab_bin as i32 * 500 + c_bin as i32 * 100 - 1200;

    if !(-1200..=126750).contains(&altitude) {
        return None;
    }

    Some(altitude)
}

/// Decode 13-bit altitude code from DF0/4/16/20.
///
/// M=1 (metric) is not decoded.
pub fn decode_altitude_13bit(alt_code_13: u32) -> Option<i32> {
    if alt_code_13 == 0 {
        return None;
    }

    let m_bit = (alt_code_13 >> 6) & 1;
    let q_bit = (alt_code_13 >> 4) & 1;

    if m_bit == 1 {
        return None;
    }

    if q_bit == 1 {
        let n =
            ((alt_code_13 & 0x1F80) >> 2) | ((alt_code_13 & 0x0020) >> 1) | (alt_code_13 & 0x000F);
        Some(n as i32 * 25 - 1000)
    } else {
        decode_gillham_altitude(alt_code_13)
    }
}

/// Decode 13-bit identity code into 4-digit octal squawk.
///
/// Bits are labeled C1 A1 C2 A2 C4 A4 _ B1 D1 B2 D2 B4 D4
pub fn decode_squawk(id_code: u32) -> String {
    let bit = |n: u32| (id_code >> n) & 1;
    let a = bit(7) * 4 + bit(9) * 2 + bit(11);
    let b = bit(1) * 4 + bit(3) * 2 + bit(5);
    let c = bit(8) * 4 + bit(10) * 2 + bit(12);
    let d = bit(0) * 4 + bit(2) * 2 + bit(4);
    format!("{a}{b}{c}{d}")
}

fn me_bits(frame: &ModeFrame) -> Result<u64> {
    frame.me_bits().ok_or(OpenskyError::Truncated("ME field"))
}

// ---------------------------------------------------------------------------
// ADS-B type codes
// ---------------------------------------------------------------------------

fn decode_identification(frame: &ModeFrame, bits: u64) -> IdentificationMsg {
    let category = ((bits >> 48) & 0x07) as u8;

    let callsign = (0..8)
        .map(|i| {
            let idx = ((bits >> (42 - i * 6)) & 0x3F) as usize;
            CALLSIGN_CHARSET[idx] as char
        })
        .collect();

    IdentificationMsg {
        icao: frame.icao,
        callsign,
        category,
        timestamp: frame.timestamp,
    }
}

fn decode_position(frame: &ModeFrame, tc: u8, bits: u64) -> PositionMsg {
    let altitude_code = ((bits >> 36) & 0x0FFF) as u32;
    let (altitude_ft, altitude_source) = match tc {
        9..=18 => (decode_altitude(altitude_code), AltitudeSource::Barometric),
        // GNSS height is plain binary metres
        20..=22 => (
            (altitude_code != 0).then(|| (altitude_code as f64 * 3.28084).round() as i32),
            AltitudeSource::Gnss,
        ),
        _ => (None, AltitudeSource::Barometric),
    };

    PositionMsg {
        icao: frame.icao,
        type_code: tc,
        altitude_ft,
        altitude_source,
        cpr_lat: ((bits >> 17) & 0x1FFFF) as u32,
        cpr_lon: (bits & 0x1FFFF) as u32,
        cpr_odd: ((bits >> 34) & 1) == 1,
        surveillance_status: ((bits >> 49) & 0x03) as u8,
        timestamp: frame.timestamp,
    }
}

/// Vertical rate in ft/min; raw 0 means "no information".
fn vertical_rate(bits: u64) -> Option<i32> {
    let raw = ((bits >> 10) & 0x1FF) as i32;
    if raw == 0 {
        return None;
    }
    let rate = (raw - 1) * 64;
    Some(if (bits >> 19) & 1 == 1 { -rate } else { rate })
}

/// Geometric minus barometric altitude in ft; raw 0 means "no information".
fn geo_minus_baro(bits: u64) -> Option<i32> {
    let raw = (bits & 0x7F) as i32;
    if raw == 0 {
        return None;
    }
    let diff = (raw - 1) * 25;
    Some(if (bits >> 7) & 1 == 1 { -diff } else { diff })
}

fn decode_velocity(frame: &ModeFrame, subtype: u8, bits: u64) -> VelocityMsg {
    let factor = if subtype == 2 || subtype == 4 { 4.0 } else { 1.0 };

    let (speed_kts, heading_deg, speed_type) = if subtype <= 2 {
        let ew_raw = ((bits >> 32) & 0x3FF) as i32;
        let ns_raw = ((bits >> 21) & 0x3FF) as i32;
        // Both components must be available for a ground vector.
        if ew_raw != 0 && ns_raw != 0 {
            let vx = (ew_raw - 1) as f64 * factor * if (bits >> 42) & 1 == 1 { -1.0 } else { 1.0 };
            let vy = (ns_raw - 1) as f64 * factor * if (bits >> 31) & 1 == 1 { -1.0 } else { 1.0 };
            let speed = (vx * vx + vy * vy).sqrt();
            let heading = vx.atan2(vy).to_degrees().rem_euclid(360.0);
            (Some(round2(speed)), Some(round2(heading)), SpeedType::Ground)
        } else {
            (None, None, SpeedType::Ground)
        }
    } else {
        let heading = ((bits >> 42) & 1 == 1)
            .then(|| round2(((bits >> 32) & 0x3FF) as f64 * 360.0 / 1024.0));
        let speed_raw = ((bits >> 21) & 0x3FF) as i32;
        let speed = (speed_raw != 0).then(|| (speed_raw - 1) as f64 * factor);
        let speed_type = if (bits >> 31) & 1 == 1 {
            SpeedType::TAS
        } else {
            SpeedType::IAS
        };
        (speed, heading, speed_type)
    };

    VelocityMsg {
        icao: frame.icao,
        subtype,
        speed_kts,
        heading_deg,
        vertical_rate_fpm: vertical_rate(bits),
        geo_minus_baro_ft: geo_minus_baro(bits),
        speed_type,
        timestamp: frame.timestamp,
    }
}

fn extended_squitter(frame: &ModeFrame, tc: u8) -> DecodedMsg {
    DecodedMsg::ExtendedSquitter(ExtendedSquitterMsg {
        icao: frame.icao,
        type_code: tc,
        timestamp: frame.timestamp,
    })
}

fn decode_adsb(frame: &ModeFrame) -> Result<DecodedMsg> {
    let bits = me_bits(frame)?;
    let tc = ((bits >> 51) & 0x1F) as u8;
    let subtype = ((bits >> 48) & 0x07) as u8;

    let msg = match tc {
        1..=4 => DecodedMsg::Identification(decode_identification(frame, bits)),
        5..=8 => DecodedMsg::SurfacePosition(decode_position(frame, tc, bits)),
        9..=18 | 20..=22 => DecodedMsg::AirbornePosition(decode_position(frame, tc, bits)),
        19 if (1..=4).contains(&subtype) => {
            DecodedMsg::Velocity(decode_velocity(frame, subtype, bits))
        }
        28 if subtype == 1 => DecodedMsg::Emergency(EmergencyMsg {
            icao: frame.icao,
            emergency_state: ((bits >> 45) & 0x07) as u8,
            squawk: decode_squawk(((bits >> 32) & 0x1FFF) as u32),
            timestamp: frame.timestamp,
        }),
        28 if subtype == 2 => DecodedMsg::Tcas(TcasMsg {
            icao: frame.icao,
            active_ra: ((bits >> 34) & 0x3FFF) as u16,
            ra_terminated: (bits >> 29) & 1 == 1,
            timestamp: frame.timestamp,
        }),
        29 => DecodedMsg::Status(StatusMsg {
            icao: frame.icao,
            kind: StatusKind::TargetState,
            version: None,
            timestamp: frame.timestamp,
        }),
        31 if subtype <= 1 => DecodedMsg::Status(StatusMsg {
            icao: frame.icao,
            kind: StatusKind::Operational,
            version: Some(((bits >> 13) & 0x07) as u8),
            timestamp: frame.timestamp,
        }),
        _ => extended_squitter(frame, tc),
    };
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode a parity-checked frame into the matching typed message.
pub fn decode(frame: &ModeFrame) -> Result<DecodedMsg> {
    match frame.df {
        17 | 18 => decode_adsb(frame),
        0 | 4 | 16 | 20 => {
            let alt_code = ((frame.raw[2] as u32 & 0x1F) << 8) | frame.raw[3] as u32;
            Ok(DecodedMsg::Altitude(AltitudeMsg {
                icao: frame.icao,
                altitude_ft: decode_altitude_13bit(alt_code),
                timestamp: frame.timestamp,
            }))
        }
        5 | 21 => {
            let id_code = ((frame.raw[2] as u32 & 0x1F) << 8) | frame.raw[3] as u32;
            Ok(DecodedMsg::Squawk(SquawkMsg {
                icao: frame.icao,
                squawk: decode_squawk(id_code),
                timestamp: frame.timestamp,
            }))
        }
        11 => Ok(DecodedMsg::AllCall(AllCallMsg {
            icao: frame.icao,
            capability: frame.raw[0] & 0x07,
            timestamp: frame.timestamp,
        })),
        df => Err(OpenskyError::UnknownDf(df)),
    }
}

/// Decode a raw hex payload. Any failure is specific to this payload.
pub fn decode_hex(hex: &str, timestamp: f64) -> Result<Decoded> {
    let frame = parse_frame(hex, timestamp)?;
    let msg = decode(&frame)?;
    Ok(Decoded { df: frame.df, msg })
}

fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crc::crc24_payload;

    /// Build a CRC-correct DF17 frame around a 56-bit ME field.
    pub(crate) fn df17_hex(icao: Icao, me: u64) -> String {
        let mut data = vec![0x8D, icao[0], icao[1], icao[2]];
        data.extend_from_slice(&me.to_be_bytes()[1..8]);
        data.extend_from_slice(&[0, 0, 0]);
        let crc = crc24_payload(&data);
        data[11] = (crc >> 16) as u8;
        data[12] = (crc >> 8) as u8;
        data[13] = crc as u8;
        hex_encode(&data)
    }

    /// Ground-speed velocity ME field (subtype 1). Raw values carry the +1 offset.
    pub(crate) fn velocity_me(ew_raw: u64, ns_raw: u64, vr_raw: u64, gmb_raw: u64) -> u64 {
        (19 << 51) | (1 << 48) | (ew_raw << 32) | (ns_raw << 21) | (vr_raw << 10) | gmb_raw
    }

    fn decode_one(hex: &str) -> DecodedMsg {
        decode_hex(hex, 1.0).expect("valid frame").msg
    }

    // -- Identification --

    #[test]
    fn test_decode_identification_klm() {
        let DecodedMsg::Identification(msg) = decode_one("8D4840D6202CC371C32CE0576098") else {
            panic!("expected identification");
        };
        assert_eq!(msg.callsign, "KLM1023 ");
        assert_eq!(icao_to_string(&msg.icao), "4840D6");
    }

    #[test]
    fn test_decode_identification_ezy() {
        let DecodedMsg::Identification(msg) = decode_one("8D406B902015A678D4D220AA4BDA") else {
            panic!("expected identification");
        };
        assert_eq!(msg.callsign, "EZY85MH ");
    }

    // -- Position --

    #[test]
    fn test_decode_position_even() {
        let DecodedMsg::AirbornePosition(msg) = decode_one("8D40621D58C382D690C8AC2863A7") else {
            panic!("expected airborne position");
        };
        assert_eq!(icao_to_string(&msg.icao), "40621D");
        assert_eq!(msg.altitude_ft, Some(38000));
        assert_eq!(msg.altitude_source, AltitudeSource::Barometric);
        assert!(!msg.cpr_odd);
        assert_eq!(msg.cpr_lat, 93000);
        assert_eq!(msg.cpr_lon, 51372);
    }

    #[test]
    fn test_decode_position_odd() {
        let DecodedMsg::AirbornePosition(msg) = decode_one("8D40621D58C386435CC412692AD6") else {
            panic!("expected airborne position");
        };
        assert!(msg.cpr_odd);
        assert_eq!(msg.cpr_lat, 74158);
        assert_eq!(msg.cpr_lon, 50194);
    }

    #[test]
    fn test_decode_surface_position() {
        // TC 7, movement/heading zeroed
        let me = (7u64 << 51) | (93000 << 17) | 51372;
        let msg = decode_one(&df17_hex([0xAB, 0xCD, 0xEF], me));
        assert!(matches!(msg, DecodedMsg::SurfacePosition(ref p) if p.is_surface()));
        assert_eq!(msg.kind(), MessageKind::SurfacePosition);
    }

    #[test]
    fn test_decode_gnss_position() {
        // TC 20, GNSS height 1000 m
        let me = (20u64 << 51) | (1000 << 36) | (93000 << 17) | 51372;
        let DecodedMsg::AirbornePosition(msg) = decode_one(&df17_hex([1, 2, 3], me)) else {
            panic!("expected airborne position");
        };
        assert_eq!(msg.altitude_source, AltitudeSource::Gnss);
        assert_eq!(msg.altitude_ft, Some(3281));
    }

    // -- Velocity --

    #[test]
    fn test_decode_velocity_ground() {
        let DecodedMsg::Velocity(msg) = decode_one("8D485020994409940838175B284F") else {
            panic!("expected velocity");
        };
        assert_eq!(icao_to_string(&msg.icao), "485020");

        let speed = msg.speed_kts.unwrap();
        assert!((speed - 159.0).abs() < 1.0, "Speed should be ~159, got {speed}");

        let heading = msg.heading_deg.unwrap();
        assert!(
            (heading - 182.88).abs() < 0.1,
            "Heading should be ~182.88, got {heading}"
        );

        assert_eq!(msg.vertical_rate_fpm, Some(-832));
        assert_eq!(msg.geo_minus_baro_ft, Some(550));
        assert_eq!(msg.speed_type, SpeedType::Ground);
    }

    #[test]
    fn test_decode_velocity_missing_fields() {
        // 250 kt due east, no vertical rate, no geo-minus-baro
        let hex = df17_hex([0xAB, 0xCD, 0xEF], velocity_me(251, 1, 0, 0));
        let DecodedMsg::Velocity(msg) = decode_one(&hex) else {
            panic!("expected velocity");
        };
        assert_eq!(msg.speed_kts, Some(250.0));
        assert_eq!(msg.heading_deg, Some(90.0));
        assert_eq!(msg.vertical_rate_fpm, None);
        assert_eq!(msg.geo_minus_baro_ft, None);
    }

    #[test]
    fn test_decode_velocity_no_vector() {
        // East-west component unavailable: no speed and no heading
        let hex = df17_hex([1, 2, 3], velocity_me(0, 11, 3, 0));
        let DecodedMsg::Velocity(msg) = decode_one(&hex) else {
            panic!("expected velocity");
        };
        assert!(msg.speed_kts.is_none());
        assert!(msg.heading_deg.is_none());
        assert_eq!(msg.vertical_rate_fpm, Some(128));
    }

    #[test]
    fn test_decode_velocity_supersonic() {
        let me = (19u64 << 51) | (2 << 48) | (101 << 32) | (1 << 21);
        let DecodedMsg::Velocity(msg) = decode_one(&df17_hex([1, 2, 3], me)) else {
            panic!("expected velocity");
        };
        assert_eq!(msg.speed_kts, Some(400.0));
    }

    #[test]
    fn test_decode_airspeed() {
        // Subtype 3, heading available, TAS 301 kt
        let me = (19u64 << 51) | (3 << 48) | (1 << 42) | (256 << 32) | (1 << 31) | (302 << 21);
        let msg = decode_one(&df17_hex([1, 2, 3], me));
        assert_eq!(msg.kind(), MessageKind::Airspeed);
        let DecodedMsg::Velocity(v) = msg else {
            panic!("expected velocity");
        };
        assert_eq!(v.speed_type, SpeedType::TAS);
        assert_eq!(v.speed_kts, Some(301.0));
        assert_eq!(v.heading_deg, Some(90.0));
    }

    // -- Other type codes --

    #[test]
    fn test_decode_emergency() {
        // TC 28 / 1, state 1 (general), squawk 7700
        let id_code = 0b0_1_0_1_0_1_0_1_0_1_0_1_0u64;
        let me = (28u64 << 51) | (1 << 48) | (1 << 45) | (id_code << 32);
        let DecodedMsg::Emergency(msg) = decode_one(&df17_hex([1, 2, 3], me)) else {
            panic!("expected emergency");
        };
        assert_eq!(msg.emergency_state, 1);
        assert_eq!(msg.squawk, "7700");
    }

    #[test]
    fn test_decode_tcas_and_status() {
        let tcas = decode_one(&df17_hex([1, 2, 3], (28u64 << 51) | (2 << 48)));
        assert_eq!(tcas.kind(), MessageKind::Tcas);

        let target = decode_one(&df17_hex([1, 2, 3], 29u64 << 51));
        assert_eq!(target.kind(), MessageKind::Status);

        let opstatus = decode_one(&df17_hex([1, 2, 3], (31u64 << 51) | (2 << 13)));
        let DecodedMsg::Status(status) = opstatus else {
            panic!("expected status");
        };
        assert_eq!(status.kind, StatusKind::Operational);
        assert_eq!(status.version, Some(2));
    }

    #[test]
    fn test_decode_unknown_type_code() {
        let msg = decode_one(&df17_hex([1, 2, 3], 24u64 << 51));
        assert_eq!(msg.kind(), MessageKind::ExtendedSquitter);
        let msg = decode_one(&df17_hex([1, 2, 3], 0));
        assert_eq!(msg.kind(), MessageKind::ExtendedSquitter);
    }

    // -- Altitude / squawk helpers --

    #[test]
    fn test_decode_altitude_25ft_exact_value() {
        // n = ((0xC38 >> 5) << 4) | (0xC38 & 0x0F) = 1560 -> 1560 * 25 - 1000
        assert_eq!(decode_altitude(0xC38), Some(38000));
    }

    #[test]
    fn test_decode_altitude_zero() {
        assert_eq!(decode_altitude(0), None);
        assert_eq!(decode_altitude_13bit(0), None);
    }

    #[test]
    fn test_decode_gillham_range() {
        let mut valid_count = 0;
        for code in 0..0x2000u32 {
            if (code >> 4) & 1 == 1 {
                continue;
            }
            if let Some(alt) = decode_altitude(code) {
                assert!(
                    (-1200..=126750).contains(&alt),
                    "Gillham code 0x{code:04X} gave altitude {alt} out of range"
                );
                valid_count += 1;
            }
        }
        assert!(valid_count > 0);
    }

    #[test]
    fn test_decode_squawk_7500() {
        assert_eq!(decode_squawk(0b0_1_0_1_0_1_0_1_0_0_0_1_0), "7500");
    }

    #[test]
    fn test_decode_squawk_7600() {
        assert_eq!(decode_squawk(0b0_1_0_1_0_1_0_0_0_1_0_1_0), "7600");
    }

    // -- Routing --

    #[test]
    fn test_decode_hex_reports_df() {
        let decoded = decode_hex("8D4840D6202CC371C32CE0576098", 1.0).unwrap();
        assert_eq!(decoded.df, 17);
        assert!(decoded.is_adsb());
        assert_eq!(icao_to_string(decoded.icao()), "4840D6");
    }

    #[test]
    fn test_decode_hex_short_replies_are_other() {
        // DF4 surveillance altitude reply, address recovered from parity
        let decoded = decode_hex("20001838CA3804", 1.0).unwrap();
        assert_eq!(decoded.df, 4);
        assert_eq!(decoded.kind(), MessageKind::Other);
        assert!(!decoded.is_adsb());
    }

    #[test]
    fn test_decode_hex_failures() {
        assert!(decode_hex("", 0.0).is_err());
        assert!(decode_hex("not hex at all!", 0.0).is_err());
        assert!(decode_hex("8D4840D6202CC371C32CE05760", 0.0).is_err());
    }
}
