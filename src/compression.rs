//! Streaming gzip services the codec delegates DEFLATE work to.
//!
//! Both sides speak the full gzip envelope; the ZIP codec strips or
//! synthesizes the envelope around the raw deflate payload itself.

use std::io::{self, Read};

use flate2::{read::GzDecoder, read::GzEncoder, Compression};

/// Produces a gzip envelope for a buffer, read back in chunks
pub trait CompressionService: Send + Sync {
    fn compress<'a>(&self, input: &'a [u8]) -> io::Result<Box<dyn Read + Send + 'a>>;
}

/// Turns a gzip envelope back into plaintext, read back in chunks
pub trait DecompressionService: Send + Sync {
    fn decompress<'a>(&self, envelope: &'a [u8]) -> Box<dyn Read + Send + 'a>;
}

/// gzip compression through `flate2`
#[derive(Debug, Clone, Copy)]
pub struct FlateGzip {
    level: Compression,
}

impl FlateGzip {
    /// `level` ranges from 0 (store) to 9 (best)
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for FlateGzip {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl CompressionService for FlateGzip {
    fn compress<'a>(&self, input: &'a [u8]) -> io::Result<Box<dyn Read + Send + 'a>> {
        Ok(Box::new(GzEncoder::new(input, self.level)))
    }
}

/// gzip decompression through `flate2`
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateGunzip;

impl DecompressionService for FlateGunzip {
    fn decompress<'a>(&self, envelope: &'a [u8]) -> Box<dyn Read + Send + 'a> {
        Box::new(GzDecoder::new(envelope))
    }
}
