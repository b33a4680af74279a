//! CRC-24 parity for Mode S messages.
//!
//! ICAO generator polynomial 0xFFF409. For DF17/18 the last 24 bits are pure
//! parity, so an intact frame leaves remainder 0. For DF0/4/5/16/20/21 the
//! parity is overlaid with the aircraft address, which the remainder recovers.

use std::collections::HashMap;
use std::sync::LazyLock;

const GENERATOR: u32 = 0xFFF409;

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x800000 != 0 {
                crc = (crc << 1) ^ GENERATOR;
            } else {
                crc <<= 1;
            }
            crc &= 0xFFFFFF;
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_crc_table();

fn divide(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &byte| {
        ((crc << 8) ^ CRC_TABLE[((crc >> 16) ^ byte as u32) as usize & 0xFF]) & 0xFFFFFF
    })
}

/// Parity of the payload (every byte but the trailing 3).
pub fn crc24_payload(data: &[u8]) -> u32 {
    if data.len() <= 3 {
        return 0;
    }
    divide(&data[..data.len() - 3])
}

/// Remainder of a full frame: payload parity XOR the trailing PI field.
pub fn crc24(data: &[u8]) -> u32 {
    if data.len() <= 3 {
        return data.iter().fold(0u32, |v, &b| (v << 8) | b as u32) & 0xFFFFFF;
    }
    let n = data.len() - 3;
    let pi = (data[n] as u32) << 16 | (data[n + 1] as u32) << 8 | data[n + 2] as u32;
    crc24_payload(data) ^ pi
}

// ---------------------------------------------------------------------------
// Syndrome correction
// ---------------------------------------------------------------------------

/// Maps a CRC syndrome to the single bit position that produces it.
struct Syndromes {
    table: HashMap<u32, usize>,
}

impl Syndromes {
    fn build(n_bits: usize) -> Self {
        let n_bytes = n_bits / 8;
        let mut table = HashMap::new();
        let flip = |msg: &mut [u8], bit: usize| msg[bit / 8] ^= 1 << (7 - (bit % 8));

        for bit in 0..n_bits {
            let mut msg = vec![0u8; n_bytes];
            flip(&mut msg, bit);
            table.entry(crc24(&msg)).or_insert(bit);
        }
        Syndromes { table }
    }

    fn lookup(&self, syndrome: u32) -> Option<usize> {
        self.table.get(&syndrome).copied()
    }
}

static SYNDROMES_112: LazyLock<Syndromes> = LazyLock::new(|| Syndromes::build(112));
static SYNDROMES_56: LazyLock<Syndromes> = LazyLock::new(|| Syndromes::build(56));

/// Repair a single flipped bit in place.
///
/// Multi-bit errors are left alone, and bits 0-4 (the DF field) are never
/// touched. Returns `true` if the frame now has remainder 0.
pub fn correct(data: &mut [u8]) -> bool {
    let syndrome = crc24(data);
    if syndrome == 0 {
        return true;
    }

    let syndromes = match data.len() * 8 {
        112 => &*SYNDROMES_112,
        56 => &*SYNDROMES_56,
        _ => return false,
    };
    let Some(bit) = syndromes.lookup(syndrome) else {
        return false;
    };
    if bit < 5 {
        return false;
    }

    let mut fixed = data.to_vec();
    fixed[bit / 8] ^= 1 << (7 - (bit % 8));
    if crc24(&fixed) != 0 {
        return false;
    }
    data.copy_from_slice(&fixed);
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
