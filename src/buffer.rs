use bytes::{BufMut, Bytes, BytesMut};

use crate::{error::ZipError, Result};

/// A reserved region of an [`ArchiveBuffer`], filled in after the fact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    offset: usize,
    len: usize,
}

impl Marker {
    /// Absolute offset of the region within the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Append-only output buffer with back-patching into reserved regions.
///
/// Every patch is checked against both its marker and the written length.
#[derive(Debug, Default)]
pub struct ArchiveBuffer {
    buf: BytesMut,
}

impl ArchiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Current write position
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Appends `len` zero bytes and returns a marker covering them
    pub fn reserve(&mut self, len: usize) -> Marker {
        let offset = self.buf.len();
        self.buf.put_bytes(0, len);
        Marker { offset, len }
    }

    /// Starts a marker at the current position; close it with [`ArchiveBuffer::close`]
    pub fn open(&self) -> usize {
        self.buf.len()
    }

    /// Marks everything written since `start`
    pub fn close(&self, start: usize) -> Marker {
        Marker {
            offset: start,
            len: self.buf.len().saturating_sub(start),
        }
    }

    pub fn patch_u16(&mut self, marker: Marker, at: usize, value: u16) -> Result<()> {
        self.patch(marker, at, &value.to_le_bytes())
    }

    pub fn patch_u32(&mut self, marker: Marker, at: usize, value: u32) -> Result<()> {
        self.patch(marker, at, &value.to_le_bytes())
    }

    /// Overwrites bytes at `at` relative to the start of `marker`
    pub fn patch(&mut self, marker: Marker, at: usize, data: &[u8]) -> Result<()> {
        let fits = at
            .checked_add(data.len())
            .is_some_and(|end| end <= marker.len)
            && marker.offset + marker.len <= self.buf.len();
        if !fits {
            return Err(ZipError::OutOfBounds {
                offset: at,
                len: data.len(),
                capacity: marker.len,
            });
        }

        let start = marker.offset + at;
        self.buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Bytes covered by `marker`, if it lies within the written data
    pub fn slice(&self, marker: Marker) -> Option<&[u8]> {
        self.buf.get(marker.offset..marker.offset.checked_add(marker.len)?)
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
