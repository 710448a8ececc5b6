use bytes::Bytes;
use tracing::debug;

use super::header::*;
use crate::{
    buffer::{ArchiveBuffer, Marker},
    error::ZipError,
    time::DosDateTime,
    CompressionMethod, Result,
};

/// Final values of a local header, known once the payload is processed
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryTotals {
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

/// Local header awaiting its CRC and sizes
#[derive(Debug)]
pub(crate) struct PendingEntry {
    header: Marker,
    name: Marker,
}

#[derive(Debug)]
struct CentralRecord {
    header: Marker,
    name: Marker,
    local_header_offset: u32,
}

/// Lays out local headers and payloads, then the central directory and EOCD.
///
/// Offsets and counts are checked against the 16/32-bit fields they land in.
#[derive(Debug)]
pub(crate) struct ArchiveWriter {
    buf: ArchiveBuffer,
    records: Vec<CentralRecord>,
}

impl ArchiveWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: ArchiveBuffer::with_capacity(capacity),
            records: Vec::new(),
        }
    }

    /// Writes a local header with method, CRC and sizes left as zero placeholders
    pub fn start_entry(&mut self, name: &str, last_modified: DosDateTime) -> Result<PendingEntry> {
        let name_len = u16::try_from(name.len()).map_err(|_| ZipError::NameTooLong {
            name: name.to_owned(),
            len: name.len(),
        })?;

        let start = self.buf.open();
        self.buf.put_u32(LOCAL_FILE_HEADER_SIGNATURE);
        self.buf.put_u16(VERSION);
        self.buf.put_u16(FLAG_UTF8);
        self.buf.put_u16(0); // method
        self.buf.put_u16(last_modified.time);
        self.buf.put_u16(last_modified.date);
        self.buf.reserve(12); // crc32, compressed size, uncompressed size
        self.buf.put_u16(name_len);
        self.buf.put_u16(0); // extra field length
        let header = self.buf.close(start);

        let start = self.buf.open();
        self.buf.put_slice(name.as_bytes());
        let name = self.buf.close(start);

        Ok(PendingEntry { header, name })
    }

    pub fn write_payload(&mut self, payload: &[u8]) {
        self.buf.put_slice(payload);
    }

    /// Back-patches the header and records it for the central directory
    pub fn finish_entry(&mut self, pending: PendingEntry, totals: EntryTotals) -> Result<()> {
        let header = pending.header;
        self.buf.patch_u16(header, LOCAL_METHOD, totals.method as u16)?;
        self.buf.patch_u32(header, LOCAL_CRC32, totals.crc32)?;
        self.buf.patch_u32(header, LOCAL_COMPRESSED_SIZE, totals.compressed_size)?;
        self.buf.patch_u32(header, LOCAL_UNCOMPRESSED_SIZE, totals.uncompressed_size)?;

        let local_header_offset = u32::try_from(header.offset())
            .map_err(|_| ZipError::ArchiveTooLarge(header.offset() as u64))?;
        self.records.push(CentralRecord {
            header,
            name: pending.name,
            local_header_offset,
        });
        Ok(())
    }

    /// Appends one entry whose final values are already known
    pub fn write_entry(
        &mut self,
        name: &str,
        last_modified: DosDateTime,
        payload: &[u8],
        totals: EntryTotals,
    ) -> Result<()> {
        let pending = self.start_entry(name, last_modified)?;
        self.write_payload(payload);
        self.finish_entry(pending, totals)
    }

    /// Writes the central directory and end record, returning the archive
    pub fn finish(mut self) -> Result<Bytes> {
        let count = self.records.len();
        let entry_count = u16::try_from(count).map_err(|_| ZipError::TooManyEntries(count))?;
        let central_dir_offset = self.checked_offset(self.buf.position())?;

        for record in &self.records {
            let mut shared = [0u8; 20];
            shared.copy_from_slice(&self.slice(record.header)?[LOCAL_SHARED_FIELDS]);
            let name = self.slice(record.name)?.to_vec();

            self.buf.put_u32(CENTRAL_DIR_SIGNATURE);
            self.buf.put_u16(VERSION); // made by
            self.buf.put_u16(VERSION); // needed
            self.buf.put_slice(&shared);
            self.buf.put_u16(name.len() as u16);
            self.buf.put_u16(0); // extra field length
            self.buf.put_u16(0); // comment length
            self.buf.put_u16(0); // disk number start
            self.buf.put_u16(0); // internal attributes
            self.buf.put_u32(0); // external attributes
            self.buf.put_u32(record.local_header_offset);
            self.buf.put_slice(&name);
        }

        let end = self.buf.position();
        let central_dir_size = self.checked_offset(end)? - central_dir_offset;

        self.buf.put_u32(END_OF_CENTRAL_DIR_SIGNATURE);
        self.buf.put_u16(0); // this disk
        self.buf.put_u16(0); // disk with central directory
        self.buf.put_u16(entry_count);
        self.buf.put_u16(entry_count);
        self.buf.put_u32(central_dir_size);
        self.buf.put_u32(central_dir_offset);
        self.buf.put_u16(0); // comment length

        debug!(
            entries = count,
            central_dir_offset,
            central_dir_size,
            total = self.buf.position(),
            "archive finished"
        );
        Ok(self.buf.freeze())
    }

    fn slice(&self, marker: Marker) -> Result<&[u8]> {
        self.buf.slice(marker).ok_or(ZipError::OutOfBounds {
            offset: marker.offset(),
            len: marker.len(),
            capacity: self.buf.position(),
        })
    }

    fn checked_offset(&self, offset: usize) -> Result<u32> {
        u32::try_from(offset).map_err(|_| ZipError::ArchiveTooLarge(offset as u64))
    }
}
