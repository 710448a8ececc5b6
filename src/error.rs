use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive truncated at offset {offset} while reading {name:?}")]
    Truncated { name: String, offset: usize },

    #[error("CRC32 mismatch for {name}: calculated={actual:08x}, stored={expected:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("Size mismatch for {name}: inflated {actual} bytes, header says {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("Unsupported compression method {method} for file {name}")]
    UnsupportedMethod { name: String, method: u16 },

    #[error("Unsupported feature in {name}: {feature}")]
    UnsupportedFeature { name: String, feature: &'static str },

    #[error("Failed to inflate {name}: {source}")]
    Decompress {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Entry name too long ({len} bytes): {name}")]
    NameTooLong { name: String, len: usize },

    #[error("Entry too large (>4GB): {name} is {size} bytes")]
    EntryTooLarge { name: String, size: u64 },

    #[error("Too many entries for a ZIP archive without ZIP64: {0}")]
    TooManyEntries(usize),

    #[error("Archive too large for 32-bit offsets: {0} bytes")]
    ArchiveTooLarge(u64),

    #[error("Write of {len} bytes at offset {offset} exceeds reserved region of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Entry name escapes the output directory: {name}")]
    UnsafeName { name: String },

    #[error("Worker error: {0}")]
    Worker(String),
}

impl ZipError {
    /// Name of the entry the error refers to, if any
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::Truncated { name, .. }
            | Self::ChecksumMismatch { name, .. }
            | Self::SizeMismatch { name, .. }
            | Self::UnsupportedMethod { name, .. }
            | Self::UnsupportedFeature { name, .. }
            | Self::Decompress { name, .. }
            | Self::NameTooLong { name, .. }
            | Self::EntryTooLarge { name, .. }
            | Self::UnsafeName { name } => Some(name),
            _ => None,
        }
    }

    /// Whether the failure came from the execution environment rather than the entry itself.
    ///
    /// The parallel packer re-encodes such entries locally instead of aborting.
    pub fn is_environmental(&self) -> bool {
        matches!(self, Self::Worker(_))
    }
}
