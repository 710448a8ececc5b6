use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::{error::ZipError, time::DosDateTime, CompressionMethod, Result};

/// One named blob going into or coming out of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub data: Bytes,
    pub last_modified: NaiveDateTime,
}

impl Entry {
    /// Creates an entry stamped with the current local time
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            last_modified: chrono::Local::now().naive_local(),
        }
    }

    pub fn with_last_modified(mut self, last_modified: NaiveDateTime) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An entry whose checksum and final payload are known, ready for assembly
#[derive(Debug, Clone)]
pub struct CompressedEntry {
    pub name: String,
    pub last_modified: DosDateTime,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub uncompressed_size: u32,
    /// Deflate payload or the original bytes, depending on `method`
    pub payload: Bytes,
}

impl CompressedEntry {
    /// Payload length as stored in the 32-bit header field
    pub fn compressed_size(&self) -> Result<u32> {
        u32::try_from(self.payload.len()).map_err(|_| ZipError::EntryTooLarge {
            name: self.name.clone(),
            size: self.payload.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_size() {
        let entry = CompressedEntry {
            name: "p".into(),
            last_modified: DosDateTime::EPOCH,
            method: CompressionMethod::Stored,
            crc32: 0,
            uncompressed_size: 3,
            payload: Bytes::from_static(b"abc"),
        };
        assert_eq!(entry.compressed_size().unwrap(), 3);
    }
}
