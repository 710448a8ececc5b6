use tracing::debug;

use super::header::{
    is_local_header, read_u32_le, LocalFileHeader, DATA_DESCRIPTOR_LEN, DATA_DESCRIPTOR_SIGNATURE,
};
use crate::{error::ZipError, Result};

/// Forward scan over the local headers of an archive.
///
/// The central directory is never consulted: scanning ends at the first
/// position that does not hold a local header signature. Each item is the
/// header and its raw (possibly deflated) payload, borrowed from the archive.
pub struct LocalEntries<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> LocalEntries<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }

    /// Offset of the next header to be read
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_next(&mut self) -> Result<(LocalFileHeader, &'a [u8])> {
        let (header, payload_start) = LocalFileHeader::parse(self.data, self.offset)?;

        if header.is_encrypted() {
            return Err(ZipError::UnsupportedFeature {
                name: header.file_name,
                feature: "encryption",
            });
        }
        if header.has_data_descriptor() && header.compressed_size == 0 {
            return Err(ZipError::UnsupportedFeature {
                name: header.file_name,
                feature: "sizes in trailing data descriptor",
            });
        }

        let payload_end = payload_start
            .checked_add(header.compressed_size as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| ZipError::Truncated {
                name: header.file_name.clone(),
                offset: payload_start,
            })?;

        self.offset = if header.has_data_descriptor() {
            self.skip_data_descriptor(&header, payload_end)?
        } else {
            payload_end
        };
        Ok((header, &self.data[payload_start..payload_end]))
    }

    /// Steps over the descriptor trailing a payload whose header already
    /// carries the sizes. The leading signature is optional.
    fn skip_data_descriptor(&self, header: &LocalFileHeader, start: usize) -> Result<usize> {
        let signed = self
            .data
            .get(start..start + 4)
            .map_or(false, |marker| read_u32_le(marker) == DATA_DESCRIPTOR_SIGNATURE);
        let len = if signed { DATA_DESCRIPTOR_LEN + 4 } else { DATA_DESCRIPTOR_LEN };

        let end = start + len;
        if end > self.data.len() {
            return Err(ZipError::Truncated {
                name: header.file_name.clone(),
                offset: start,
            });
        }
        debug!(name = %header.file_name, signed, "skipped data descriptor");
        Ok(end)
    }
}

impl<'a> Iterator for LocalEntries<'a> {
    type Item = Result<(LocalFileHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !is_local_header(self.data, self.offset) {
            return None;
        }

        let item = self.read_next();
        // the scan cannot resynchronize after a bad header
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
