//! Fixed layouts of the three ZIP records this crate reads and writes.

use crate::{error::ZipError, time::DosDateTime, Result};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIR_SIGNATURE: u32 = 0x02014b50;
pub const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;
/// Optional marker in front of a data descriptor
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

pub const LOCAL_FILE_HEADER_LEN: usize = 30;
pub const CENTRAL_DIR_HEADER_LEN: usize = 46;
pub const END_OF_CENTRAL_DIR_LEN: usize = 22;
/// crc32, compressed size, uncompressed size
pub const DATA_DESCRIPTOR_LEN: usize = 12;

/// Version 2.0: deflate, folders
pub const VERSION: u16 = 20;
/// General purpose bit 11: name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

// Offsets within the local file header
pub(crate) const LOCAL_METHOD: usize = 8;
pub(crate) const LOCAL_CRC32: usize = 14;
pub(crate) const LOCAL_COMPRESSED_SIZE: usize = 18;
pub(crate) const LOCAL_UNCOMPRESSED_SIZE: usize = 22;
/// flags .. uncompressed size, shared verbatim with the central directory
pub(crate) const LOCAL_SHARED_FIELDS: std::ops::Range<usize> = 6..26;

/// Parsed local file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: String,
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// Parses the header starting at `offset`, signature included.
    ///
    /// Returns the header and the offset of the first payload byte.
    pub fn parse(data: &[u8], offset: usize) -> Result<(Self, usize)> {
        let fixed = offset
            .checked_add(LOCAL_FILE_HEADER_LEN)
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| ZipError::Truncated {
                name: String::new(),
                offset,
            })?;

        if read_u32_le(fixed) != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(ZipError::Truncated {
                name: String::new(),
                offset,
            });
        }

        let name_len = read_u16_le(&fixed[26..]) as usize;
        let extra_len = read_u16_le(&fixed[28..]);
        let name_start = offset + LOCAL_FILE_HEADER_LEN;

        let name_bytes = data
            .get(name_start..name_start + name_len)
            .ok_or_else(|| ZipError::Truncated {
                name: String::new(),
                offset: name_start,
            })?;
        let file_name = String::from_utf8_lossy(name_bytes).into_owned();

        let payload_start = name_start + name_len + extra_len as usize;
        if payload_start > data.len() {
            return Err(ZipError::Truncated {
                name: file_name,
                offset: name_start + name_len,
            });
        }

        let header = Self {
            version_needed: read_u16_le(&fixed[4..]),
            flags: read_u16_le(&fixed[6..]),
            compression_method: read_u16_le(&fixed[LOCAL_METHOD..]),
            last_modified: DosDateTime {
                time: read_u16_le(&fixed[10..]),
                date: read_u16_le(&fixed[12..]),
            },
            crc32: read_u32_le(&fixed[LOCAL_CRC32..]),
            compressed_size: read_u32_le(&fixed[LOCAL_COMPRESSED_SIZE..]),
            uncompressed_size: read_u32_le(&fixed[LOCAL_UNCOMPRESSED_SIZE..]),
            file_name,
            extra_len,
        };

        Ok((header, payload_start))
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Sizes and CRC live after the payload instead of in this header
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// Whether a local file header starts at `offset`
pub(crate) fn is_local_header(data: &[u8], offset: usize) -> bool {
    data.get(offset..offset.saturating_add(4))
        .map(|sig| read_u32_le(sig) == LOCAL_FILE_HEADER_SIGNATURE)
        .unwrap_or(false)
}

pub(crate) fn read_u16_le(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

pub(crate) fn read_u32_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        vec![
            b'P', b'K', 0x03, 0x04, // Signature
            0x14, 0x00, // Version
            0x00, 0x08, // Flags (UTF-8)
            0x00, 0x00, // Compression (Store)
            0x21, 0x00, 0x21, 0x00, // Mod time/date
            0x78, 0x56, 0x34, 0x12, // CRC32
            0x04, 0x00, 0x00, 0x00, // Compressed size
            0x04, 0x00, 0x00, 0x00, // Uncompressed size
            0x04, 0x00, // Filename length
            0x02, 0x00, // Extra field length
            b't', b'e', b's', b't', // Filename
            0xEE, 0xEE, // Extra field
            b'd', b'a', b't', b'a', // File data
        ]
    }

    #[test]
    fn test_parse() {
        let (header, payload) = LocalFileHeader::parse(&sample(), 0).unwrap();
        assert_eq!(header.version_needed, VERSION);
        assert_eq!(header.flags, FLAG_UTF8);
        assert_eq!(header.compression_method, 0);
        assert_eq!(header.last_modified, DosDateTime { time: 0x21, date: 0x21 });
        assert_eq!(header.crc32, 0x1234_5678);
        assert_eq!(header.compressed_size, 4);
        assert_eq!(header.uncompressed_size, 4);
        assert_eq!(header.file_name, "test");
        assert_eq!(header.extra_len, 2);
        assert_eq!(payload, 36);
        assert!(!header.is_encrypted());
        assert!(!header.has_data_descriptor());
    }

    #[test]
    fn test_parse_truncated() {
        let data = sample();
        for cut in [10, 29, 32, 35] {
            assert!(
                matches!(LocalFileHeader::parse(&data[..cut], 0), Err(ZipError::Truncated { .. })),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_signature_probe() {
        let data = sample();
        assert!(is_local_header(&data, 0));
        assert!(!is_local_header(&data, 1));
        assert!(!is_local_header(&data, data.len() - 2));
        assert!(!is_local_header(&data, usize::MAX));
    }
}
