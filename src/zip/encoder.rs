use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::entry::{CompressedEntry, Entry};
use super::header::{CENTRAL_DIR_HEADER_LEN, END_OF_CENTRAL_DIR_LEN, LOCAL_FILE_HEADER_LEN};
use super::writer::{ArchiveWriter, EntryTotals};
use crate::{
    compression::{CompressionService, FlateGzip},
    constants::MAX_NAME_LEN,
    crc::crc32,
    envelope::{strip_gzip_envelope, Fallback},
    error::ZipError,
    time::DosDateTime,
    CompressionMethod, Result,
};

/// Builds ZIP archives from in-memory entries.
///
/// Compression is attempted only when enabled and a [`CompressionService`] is
/// configured. An entry is deflated only if the deflate payload is strictly
/// smaller than the original; otherwise, or when the service fails, it is
/// stored.
#[derive(Clone)]
pub struct ZipEncoder {
    compressor: Option<Arc<dyn CompressionService>>,
    compress_when_possible: bool,
}

impl Default for ZipEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZipEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipEncoder")
            .field("has_compressor", &self.compressor.is_some())
            .field("compress_when_possible", &self.compress_when_possible)
            .finish()
    }
}

impl ZipEncoder {
    /// Encoder that deflates through `flate2` when it helps
    pub fn new() -> Self {
        Self {
            compressor: Some(Arc::new(FlateGzip::default())),
            compress_when_possible: true,
        }
    }

    /// Encoder that always stores
    pub fn stored() -> Self {
        Self {
            compressor: None,
            compress_when_possible: false,
        }
    }

    pub fn compress_when_possible(mut self, enabled: bool) -> Self {
        self.compress_when_possible = enabled;
        self
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn CompressionService>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn without_compressor(mut self) -> Self {
        self.compressor = None;
        self
    }

    /// Encodes `entries` into one archive, in order
    pub fn encode(&self, entries: &[Entry]) -> Result<Bytes> {
        let mut writer = ArchiveWriter::with_capacity(estimate_size(
            entries.iter().map(|e| (e.name.len(), e.data.len())),
        ));

        for entry in entries {
            let uncompressed_size = checked_size(&entry.name, entry.data.len())?;
            let pending = writer.start_entry(&entry.name, DosDateTime::from_datetime(&entry.last_modified))?;

            let crc32 = crc32(&entry.data, 0);
            let (method, payload) = self.choose_payload(entry);
            writer.write_payload(&payload);

            let totals = EntryTotals {
                method,
                crc32,
                compressed_size: payload.len() as u32,
                uncompressed_size,
            };
            writer.finish_entry(pending, totals)?;
            log_entry(&entry.name, &totals);
        }

        writer.finish()
    }

    /// Computes the checksum and final payload of one entry.
    ///
    /// This is the part of encoding worth running on a worker; the result is
    /// laid out by [`ZipEncoder::assemble`].
    pub fn compress_entry(&self, entry: &Entry) -> Result<CompressedEntry> {
        let uncompressed_size = checked_size(&entry.name, entry.data.len())?;
        if entry.name.len() > MAX_NAME_LEN {
            return Err(ZipError::NameTooLong {
                name: entry.name.clone(),
                len: entry.name.len(),
            });
        }

        let crc32 = crc32(&entry.data, 0);
        let (method, payload) = self.choose_payload(entry);

        Ok(CompressedEntry {
            name: entry.name.clone(),
            last_modified: DosDateTime::from_datetime(&entry.last_modified),
            method,
            crc32,
            uncompressed_size,
            payload,
        })
    }

    /// Same as [`ZipEncoder::compress_entry`] but never attempts compression
    pub fn store_entry(entry: &Entry) -> Result<CompressedEntry> {
        ZipEncoder::stored().compress_entry(entry)
    }

    /// Lays out already-compressed entries, in order, as a complete archive
    pub fn assemble(entries: &[CompressedEntry]) -> Result<Bytes> {
        let mut writer = ArchiveWriter::with_capacity(estimate_size(
            entries.iter().map(|e| (e.name.len(), e.payload.len())),
        ));

        for entry in entries {
            let compressed_size = entry.compressed_size()?;
            let totals = EntryTotals {
                method: entry.method,
                crc32: entry.crc32,
                compressed_size,
                uncompressed_size: entry.uncompressed_size,
            };
            writer.write_entry(&entry.name, entry.last_modified, &entry.payload, totals)?;
            log_entry(&entry.name, &totals);
        }

        writer.finish()
    }

    fn choose_payload(&self, entry: &Entry) -> (CompressionMethod, Bytes) {
        let compressor = match (&self.compressor, self.compress_when_possible) {
            (Some(compressor), true) => compressor,
            _ => return (CompressionMethod::Stored, entry.data.clone()),
        };

        let deflated = compressor
            .compress(&entry.data)
            .map_err(Fallback::from)
            .and_then(|stream| strip_gzip_envelope(stream, entry.data.len()));

        match deflated {
            Ok(payload) => (CompressionMethod::Deflated, Bytes::from(payload)),
            Err(Fallback::Ineffective { compressed, original }) => {
                debug!(name = %entry.name, compressed, original, "compression ineffective, storing");
                (CompressionMethod::Stored, entry.data.clone())
            }
            Err(reason) => {
                warn!(name = %entry.name, %reason, "compression unavailable, storing");
                (CompressionMethod::Stored, entry.data.clone())
            }
        }
    }
}

fn checked_size(name: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ZipError::EntryTooLarge {
        name: name.to_owned(),
        size: len as u64,
    })
}

/// Upper bound on archive size when every entry is stored
fn estimate_size(entries: impl Iterator<Item = (usize, usize)>) -> usize {
    entries.fold(END_OF_CENTRAL_DIR_LEN, |total, (name_len, data_len)| {
        total
            .saturating_add(LOCAL_FILE_HEADER_LEN + CENTRAL_DIR_HEADER_LEN)
            .saturating_add(name_len.saturating_mul(2))
            .saturating_add(data_len)
    })
}

fn log_entry(name: &str, totals: &EntryTotals) {
    debug!(
        name,
        method = ?totals.method,
        crc32 = totals.crc32,
        compressed = totals.compressed_size,
        uncompressed = totals.uncompressed_size,
        "entry written"
    );
}
