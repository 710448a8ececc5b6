use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use super::entry::Entry;
use super::header::LocalFileHeader;
use super::reader::LocalEntries;
use crate::{
    compression::{DecompressionService, FlateGunzip},
    constants::DEFAULT_BUFFER_SIZE,
    crc::{crc32, Crc32Hasher},
    envelope::wrap_gzip_envelope,
    error::ZipError,
    time::from_dos_time,
    CompressionMethod, Result,
};

/// Reads archives produced by [`ZipEncoder`](super::ZipEncoder) or any writer
/// that records sizes in its local headers.
#[derive(Clone)]
pub struct ZipDecoder {
    decompressor: Arc<dyn DecompressionService>,
}

impl Default for ZipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZipDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipDecoder").finish_non_exhaustive()
    }
}

impl ZipDecoder {
    pub fn new() -> Self {
        Self {
            decompressor: Arc::new(FlateGunzip),
        }
    }

    pub fn with_decompressor(decompressor: Arc<dyn DecompressionService>) -> Self {
        Self { decompressor }
    }

    /// Headers and raw payloads, in archive order, without decompressing
    pub fn headers<'a>(&self, archive: &'a [u8]) -> LocalEntries<'a> {
        LocalEntries::new(archive)
    }

    /// Decodes every entry, verifying checksums.
    ///
    /// Stops at the first entry that fails; entries are returned in archive
    /// order with payloads copied out of `archive`.
    pub fn decode(&self, archive: &[u8]) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for item in self.headers(archive) {
            let (header, payload) = item?;
            entries.push(self.decode_entry(&header, payload)?);
        }
        debug!(entries = entries.len(), bytes = archive.len(), "archive decoded");
        Ok(entries)
    }

    /// Decodes one entry from its header and raw payload
    pub fn decode_entry(&self, header: &LocalFileHeader, payload: &[u8]) -> Result<Entry> {
        let name = &header.file_name;
        let method = CompressionMethod::from_u16(header.compression_method).ok_or_else(|| {
            ZipError::UnsupportedMethod {
                name: name.clone(),
                method: header.compression_method,
            }
        })?;

        let data = match method {
            CompressionMethod::Stored => {
                let actual = crc32(payload, 0);
                verify_crc(name, header.crc32, actual)?;
                Bytes::copy_from_slice(payload)
            }
            CompressionMethod::Deflated => self.inflate(header, payload)?,
        };

        trace!(name = %name, ?method, size = data.len(), "entry decoded");
        Ok(Entry {
            name: name.clone(),
            data,
            last_modified: from_dos_time(header.last_modified.time, header.last_modified.date),
        })
    }

    fn inflate(&self, header: &LocalFileHeader, payload: &[u8]) -> Result<Bytes> {
        let name = &header.file_name;
        let expected = header.uncompressed_size as u64;
        let envelope = wrap_gzip_envelope(payload, header.crc32, header.uncompressed_size);
        let decompress_error = |source: io::Error| ZipError::Decompress {
            name: name.clone(),
            source,
        };

        // one byte past the header's size is enough to detect a mismatch
        let mut reader = self.decompressor.decompress(&envelope).take(expected + 1);
        // the header's size is untrusted; let the buffer grow past this
        let capacity = payload
            .len()
            .saturating_mul(4)
            .max(DEFAULT_BUFFER_SIZE)
            .min(header.uncompressed_size as usize);
        let mut out = Vec::with_capacity(capacity);
        let mut hasher = Crc32Hasher::new();
        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // the service's own trailer check repeats ours; report what actually differs
                Err(_) if out.len() as u64 != expected => {
                    return Err(ZipError::SizeMismatch {
                        name: name.clone(),
                        expected,
                        actual: out.len() as u64,
                    });
                }
                Err(_) if hasher.finalize() != header.crc32 => {
                    return Err(ZipError::ChecksumMismatch {
                        name: name.clone(),
                        expected: header.crc32,
                        actual: hasher.finalize(),
                    });
                }
                Err(e) => return Err(decompress_error(e)),
            };
            hasher.update(&chunk[..n]);
            out.extend_from_slice(&chunk[..n]);
        }

        if out.len() as u64 != expected {
            return Err(ZipError::SizeMismatch {
                name: name.clone(),
                expected,
                actual: out.len() as u64,
            });
        }
        verify_crc(name, header.crc32, hasher.finalize())?;

        Ok(Bytes::from(out))
    }
}

fn verify_crc(name: &str, expected: u32, actual: u32) -> Result<()> {
    if expected != actual {
        return Err(ZipError::ChecksumMismatch {
            name: name.to_owned(),
            expected,
            actual,
        });
    }
    Ok(())
}
