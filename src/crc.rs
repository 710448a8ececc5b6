//! CRC-32 (IEEE, reflected polynomial `0xEDB88320`) with a slice-by-16 table.
//!
//! The sixteen 256-entry tables are built on first use and shared by every
//! caller afterwards.

use std::sync::OnceLock;

const POLYNOMIAL: u32 = 0xEDB8_8320;

type Tables = [[u32; 256]; 16];

static TABLES: OnceLock<Box<Tables>> = OnceLock::new();

fn build_tables() -> Box<Tables> {
    let mut tables = Box::new([[0u32; 256]; 16]);

    for n in 0..256 {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
        }
        tables[0][n] = c;
    }

    // Each further slice advances the previous one by one more zero byte.
    for slice in 1..16 {
        for n in 0..256 {
            let prev = tables[slice - 1][n];
            tables[slice][n] = (prev >> 8) ^ tables[0][(prev & 0xFF) as usize];
        }
    }

    tables
}

#[inline]
fn tables() -> &'static Tables {
    TABLES.get_or_init(build_tables)
}

/// Computes the CRC32 of `data`, continuing from a previous result `seed`.
///
/// Pass `0` to start a fresh checksum. Chaining works on finalized values:
/// `crc32(b, crc32(a, 0)) == crc32(ab, 0)`.
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    !update(!seed, data)
}

fn update(mut crc: u32, data: &[u8]) -> u32 {
    let t = tables();
    let mut chunks = data.chunks_exact(16);

    for d in chunks.by_ref() {
        crc = t[15][(d[0] ^ crc as u8) as usize]
            ^ t[14][(d[1] ^ (crc >> 8) as u8) as usize]
            ^ t[13][(d[2] ^ (crc >> 16) as u8) as usize]
            ^ t[12][(d[3] ^ (crc >> 24) as u8) as usize]
            ^ t[11][d[4] as usize]
            ^ t[10][d[5] as usize]
            ^ t[9][d[6] as usize]
            ^ t[8][d[7] as usize]
            ^ t[7][d[8] as usize]
            ^ t[6][d[9] as usize]
            ^ t[5][d[10] as usize]
            ^ t[4][d[11] as usize]
            ^ t[3][d[12] as usize]
            ^ t[2][d[13] as usize]
            ^ t[1][d[14] as usize]
            ^ t[0][d[15] as usize];
    }

    for &byte in chunks.remainder() {
        crc = (crc >> 8) ^ t[0][((crc ^ byte as u32) & 0xFF) as usize];
    }

    crc
}

/// Streaming CRC32 over data that arrives in pieces
#[derive(Debug, Clone, Copy)]
pub struct Crc32Hasher {
    state: u32,
}

impl Crc32Hasher {
    pub fn new() -> Self {
        Self::new_with_initial(0)
    }

    /// Resumes from a finalized checksum of earlier data
    pub fn new_with_initial(crc: u32) -> Self {
        Self { state: !crc }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state = update(self.state, data);
    }

    pub fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32Hasher {
    fn default() -> Self {
        Self::new()
    }
}
