//! Shared types, error enum, and decoded message types for opensky-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by opensky-core.
///
/// Everything except `Config` is a per-record decode failure: the pipelines
/// count it and move on to the next record.
#[derive(Debug, Error)]
pub enum OpenskyError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid frame length: expected {expected} bits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unsupported downlink format: {0}")]
    UnknownDf(u8),
    #[error("CRC validation failed")]
    CrcFailed,
    #[error("message field truncated: {0}")]
    Truncated(&'static str),
    #[error("config error: {0}")]
    Config(String),
}

impl OpenskyError {
    /// True for failures tied to a single malformed payload.
    pub fn is_decode_failure(&self) -> bool {
        !matches!(self, OpenskyError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, OpenskyError>;

// ---------------------------------------------------------------------------
// Downlink Format metadata
// ---------------------------------------------------------------------------

/// Metadata for a Downlink Format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfInfo {
    pub name: &'static str,
    pub bits: usize,
}

/// Downlink Formats the decoder understands.
pub const DF_TABLE: &[(u8, DfInfo)] = &[
    (0, DfInfo { name: "Short air-air surveillance", bits: 56 }),
    (4, DfInfo { name: "Surveillance altitude reply", bits: 56 }),
    (5, DfInfo { name: "Surveillance identity reply", bits: 56 }),
    (11, DfInfo { name: "All-call reply", bits: 56 }),
    (16, DfInfo { name: "Long air-air surveillance", bits: 112 }),
    (17, DfInfo { name: "ADS-B extended squitter", bits: 112 }),
    (18, DfInfo { name: "TIS-B / ADS-R", bits: 112 }),
    (20, DfInfo { name: "Comm-B altitude reply", bits: 112 }),
    (21, DfInfo { name: "Comm-B identity reply", bits: 112 }),
];

/// Look up DF metadata. Returns `None` for unsupported DFs.
pub fn df_info(df: u8) -> Option<&'static DfInfo> {
    DF_TABLE
        .iter()
        .find(|(d, _)| *d == df)
        .map(|(_, info)| info)
}

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 24-bit ICAO aircraft address as raw bytes.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char uppercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02X}{:02X}{:02X}", icao[0], icao[1], icao[2])
}

/// Parse a 6-char hex string (either case) into an ICAO address.
pub fn icao_from_hex(hex: &str) -> Option<Icao> {
    let hex = hex.trim();
    if hex.len() != 6 {
        return None;
    }
    let bytes = hex_decode(hex)?;
    Some([bytes[0], bytes[1], bytes[2]])
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if !hex.len().is_multiple_of(2) {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// ADS-B character set for callsign encoding (6 bits per character).
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// TC 1-4: Aircraft identification (callsign).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationMsg {
    pub icao: Icao,
    pub callsign: String,
    pub category: u8,
    pub timestamp: f64,
}

/// Source of the altitude carried in a position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AltitudeSource {
    Barometric,
    Gnss,
}

/// TC 5-8 (surface) or TC 9-18/20-22 (airborne): CPR-encoded position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionMsg {
    pub icao: Icao,
    pub type_code: u8,
    pub altitude_ft: Option<i32>,
    pub altitude_source: AltitudeSource,
    pub cpr_lat: u32,
    pub cpr_lon: u32,
    pub cpr_odd: bool,
    pub surveillance_status: u8,
    pub timestamp: f64,
}

impl PositionMsg {
    pub fn is_surface(&self) -> bool {
        (5..=8).contains(&self.type_code)
    }
}

/// TC 19: Airborne velocity. Every component is `None` when the message
/// flags it as unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityMsg {
    pub icao: Icao,
    pub subtype: u8,
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    pub geo_minus_baro_ft: Option<i32>,
    pub speed_type: SpeedType,
    pub timestamp: f64,
}

/// Speed type for velocity messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedType {
    Ground,
    IAS,
    TAS,
}

impl std::fmt::Display for SpeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedType::Ground => write!(f, "ground"),
            SpeedType::IAS => write!(f, "IAS"),
            SpeedType::TAS => write!(f, "TAS"),
        }
    }
}

/// TC 28 subtype 1: emergency / priority status with Mode A code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyMsg {
    pub icao: Icao,
    pub emergency_state: u8,
    pub squawk: String,
    pub timestamp: f64,
}

/// TC 28 subtype 2: TCAS resolution advisory broadcast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcasMsg {
    pub icao: Icao,
    pub active_ra: u16,
    pub ra_terminated: bool,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusKind {
    /// TC 29
    TargetState,
    /// TC 31
    Operational,
}

/// TC 29 / TC 31 status messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMsg {
    pub icao: Icao,
    pub kind: StatusKind,
    /// ADS-B version number, only carried by operational status.
    pub version: Option<u8>,
    pub timestamp: f64,
}

/// DF17/18 with a type code (or subtype) that carries nothing decodable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedSquitterMsg {
    pub icao: Icao,
    pub type_code: u8,
    pub timestamp: f64,
}

/// DF0/4/16/20: Altitude reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeMsg {
    pub icao: Icao,
    pub altitude_ft: Option<i32>,
    pub timestamp: f64,
}

/// DF5/21: Identity reply (squawk code).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquawkMsg {
    pub icao: Icao,
    pub squawk: String,
    pub timestamp: f64,
}

/// DF11: All-call reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllCallMsg {
    pub icao: Icao,
    pub capability: u8,
    pub timestamp: f64,
}

/// Union type for all decoded messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DecodedMsg {
    Identification(IdentificationMsg),
    AirbornePosition(PositionMsg),
    SurfacePosition(PositionMsg),
    Velocity(VelocityMsg),
    Emergency(EmergencyMsg),
    Tcas(TcasMsg),
    Status(StatusMsg),
    ExtendedSquitter(ExtendedSquitterMsg),
    Altitude(AltitudeMsg),
    Squawk(SquawkMsg),
    AllCall(AllCallMsg),
}

/// Coarse message classification used by the filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    AirbornePosition,
    SurfacePosition,
    Velocity,
    Airspeed,
    Identification,
    Emergency,
    Status,
    Tcas,
    /// ADS-B frame of unknown content.
    ExtendedSquitter,
    /// Any non-ADS-B reply.
    Other,
}

impl DecodedMsg {
    /// Get the ICAO address from any message type.
    pub fn icao(&self) -> &Icao {
        match self {
            DecodedMsg::Identification(m) => &m.icao,
            DecodedMsg::AirbornePosition(m) | DecodedMsg::SurfacePosition(m) => &m.icao,
            DecodedMsg::Velocity(m) => &m.icao,
            DecodedMsg::Emergency(m) => &m.icao,
            DecodedMsg::Tcas(m) => &m.icao,
            DecodedMsg::Status(m) => &m.icao,
            DecodedMsg::ExtendedSquitter(m) => &m.icao,
            DecodedMsg::Altitude(m) => &m.icao,
            DecodedMsg::Squawk(m) => &m.icao,
            DecodedMsg::AllCall(m) => &m.icao,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            DecodedMsg::Identification(_) => MessageKind::Identification,
            DecodedMsg::AirbornePosition(_) => MessageKind::AirbornePosition,
            DecodedMsg::SurfacePosition(_) => MessageKind::SurfacePosition,
            DecodedMsg::Velocity(m) if m.speed_type == SpeedType::Ground => MessageKind::Velocity,
            DecodedMsg::Velocity(_) => MessageKind::Airspeed,
            DecodedMsg::Emergency(_) => MessageKind::Emergency,
            DecodedMsg::Tcas(_) => MessageKind::Tcas,
            DecodedMsg::Status(_) => MessageKind::Status,
            DecodedMsg::ExtendedSquitter(_) => MessageKind::ExtendedSquitter,
            DecodedMsg::Altitude(_) | DecodedMsg::Squawk(_) | DecodedMsg::AllCall(_) => {
                MessageKind::Other
            }
        }
    }
}

/// A decoded message together with the Downlink Format it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    pub df: u8,
    pub msg: DecodedMsg,
}

impl Decoded {
    pub fn kind(&self) -> MessageKind {
        self.msg.kind()
    }

    pub fn icao(&self) -> &Icao {
        self.msg.icao()
    }

    /// True for DF17 frames, the only ones the extractor keeps.
    pub fn is_adsb(&self) -> bool {
        self.df == 17
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
