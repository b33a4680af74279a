//! Parse raw hex payloads into structured Mode S frames.
//!
//! - Classify Downlink Format (DF) from the first 5 bits
//! - Check the frame length against the DF
//! - Validate parity, repairing single-bit errors on DF17/18
//! - Extract the ICAO address (explicit or from the CRC residual)

use crate::crc;
use crate::types::{df_info, hex_decode, Icao, OpenskyError, Result};

/// A parity-checked Mode S frame.
#[derive(Debug, Clone)]
pub struct ModeFrame {
    /// Downlink Format (0-24)
    pub df: u8,
    /// 3-byte ICAO address
    pub icao: Icao,
    /// Full message bytes (after any repair)
    pub raw: Vec<u8>,
    /// Receipt time, seconds
    pub timestamp: f64,
}

impl ModeFrame {
    pub fn is_long(&self) -> bool {
        self.raw.len() == 14
    }

    /// Message Extended field (bytes 4-10, 56 bits). Empty for short frames.
    pub fn me(&self) -> &[u8] {
        if self.is_long() {
            &self.raw[4..11]
        } else {
            &[]
        }
    }

    /// ME field right-aligned in a u64. ME bit n (1-based) sits at shift 56-n.
    pub fn me_bits(&self) -> Option<u64> {
        let me = self.me();
        if me.len() != 7 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[1..8].copy_from_slice(me);
        Some(u64::from_be_bytes(buf))
    }

    /// ADS-B Type Code (first 5 bits of ME field). None for non-ADS-B.
    pub fn type_code(&self) -> Option<u8> {
        if (self.df != 17 && self.df != 18) || !self.is_long() {
            return None;
        }
        Some((self.raw[4] >> 3) & 0x1F)
    }
}

/// Parse a hex payload into a ModeFrame.
pub fn parse_frame(hex_str: &str, timestamp: f64) -> Result<ModeFrame> {
    let hex_str = hex_str.trim();

    if hex_str.len() != 14 && hex_str.len() != 28 {
        return Err(OpenskyError::InvalidLength {
            expected: if hex_str.len() > 14 { 112 } else { 56 },
            actual: hex_str.len() * 4,
        });
    }

    let mut raw = hex_decode(hex_str).ok_or_else(|| OpenskyError::InvalidHex(hex_str.into()))?;
    let df = (raw[0] >> 3) & 0x1F;
    let info = df_info(df).ok_or(OpenskyError::UnknownDf(df))?;

    let msg_bits = raw.len() * 8;
    if msg_bits != info.bits {
        return Err(OpenskyError::InvalidLength {
            expected: info.bits,
            actual: msg_bits,
        });
    }

    let icao = match df {
        17 | 18 => {
            if !crc::correct(&mut raw) {
                return Err(OpenskyError::CrcFailed);
            }
            [raw[1], raw[2], raw[3]]
        }
        11 => {
            // Remainder may only carry the interrogator code.
            if crc::crc24(&raw) & !0x7F != 0 {
                return Err(OpenskyError::CrcFailed);
            }
            [raw[1], raw[2], raw[3]]
        }
        _ => {
            let residual = crc::crc24(&raw);
            [
                ((residual >> 16) & 0xFF) as u8,
                ((residual >> 8) & 0xFF) as u8,
                (residual & 0xFF) as u8,
            ]
        }
    };

    Ok(ModeFrame {
        df,
        icao,
        raw,
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
