use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    time::from_dos_time,
    zip::{LocalEntries, LocalFileHeader},
    CompressionMethod, Result,
};

/// One line of an archive listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub method: String,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub last_modified: String,
}

/// Totals gathered from an archive's local headers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArchiveStats {
    pub entry_count: usize,
    pub total_compressed: u64,
    pub total_uncompressed: u64,
    /// Entries per compression method
    pub methods: BTreeMap<String, usize>,
    /// Compressed bytes over uncompressed bytes; 1.0 for an empty archive
    pub compression_ratio: f64,
    pub entries: Vec<EntrySummary>,
}

impl ArchiveStats {
    /// Scans local headers without decompressing anything
    pub fn from_archive(archive: &[u8]) -> Result<Self> {
        let mut stats = Self::default();
        for item in LocalEntries::new(archive) {
            let (header, _) = item?;
            stats.record(&header);
        }
        stats.compression_ratio = stats.ratio();
        Ok(stats)
    }

    fn record(&mut self, header: &LocalFileHeader) {
        let method = method_name(header.compression_method);
        *self.methods.entry(method.clone()).or_insert(0) += 1;

        self.entry_count += 1;
        self.total_compressed += u64::from(header.compressed_size);
        self.total_uncompressed += u64::from(header.uncompressed_size);
        self.entries.push(EntrySummary {
            name: header.file_name.clone(),
            method,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            last_modified: from_dos_time(header.last_modified.time, header.last_modified.date)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        });
    }

    fn ratio(&self) -> f64 {
        if self.total_uncompressed == 0 {
            1.0
        } else {
            self.total_compressed as f64 / self.total_uncompressed as f64
        }
    }

    /// Plain-text listing, one entry per line followed by a totals line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{:>10} {:>10} {:<8} {:08x} {} {}\n",
                entry.uncompressed_size,
                entry.compressed_size,
                entry.method,
                entry.crc32,
                entry.last_modified,
                entry.name
            ));
        }
        out.push_str(&format!(
            "{:>10} {:>10} {} entries, ratio {:.1}%\n",
            self.total_uncompressed,
            self.total_compressed,
            self.entry_count,
            self.compression_ratio * 100.0
        ));
        out
    }
}

fn method_name(code: u16) -> String {
    match CompressionMethod::from_u16(code) {
        Some(method) => method.to_string(),
        None => format!("method {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZipError;
    use crate::zip::{Entry, ZipEncoder};
    use chrono::NaiveDate;

    fn archive() -> bytes::Bytes {
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap();
        ZipEncoder::new()
            .encode(&[
                Entry::new("a.txt", "aaaa".repeat(100)).with_last_modified(stamp),
                Entry::new("b.bin", &b"\x01\x02\x03"[..]).with_last_modified(stamp),
            ])
            .unwrap()
    }

    #[test]
    fn test_stats_from_archive() {
        let stats = ArchiveStats::from_archive(&archive()).unwrap();

        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_uncompressed, 403);
        assert!(stats.total_compressed < stats.total_uncompressed);
        assert_eq!(stats.methods.get("deflated"), Some(&1));
        assert_eq!(stats.methods.get("stored"), Some(&1));
        assert_eq!(stats.entries[1].name, "b.bin");
        assert_eq!(stats.entries[1].crc32, crate::crc::crc32(b"\x01\x02\x03", 0));
        assert_eq!(stats.entries[0].last_modified, "2024-03-15 13:45:30");
        assert!(stats.compression_ratio < 1.0);
    }

    #[test]
    fn test_unknown_method_is_listed() {
        let mut bytes = archive().to_vec();
        bytes[8] = 12;
        let stats = ArchiveStats::from_archive(&bytes).unwrap();
        assert_eq!(stats.methods.get("method 12"), Some(&1));
    }

    #[test]
    fn test_empty_archive() {
        let empty = ZipEncoder::new().encode(&[]).unwrap();
        let stats = ArchiveStats::from_archive(&empty).unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.compression_ratio, 1.0);
        assert!(stats.render().contains("0 entries"));
    }

    #[test]
    fn test_truncated_archive() {
        let bytes = archive();
        assert!(matches!(
            ArchiveStats::from_archive(&bytes[..33]),
            Err(ZipError::Truncated { .. })
        ));
    }

    #[test]
    fn test_json_shape() {
        let stats = ArchiveStats::from_archive(&archive()).unwrap();
        let json: serde_json::Value = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["entry_count"], 2);
        assert_eq!(json["entries"][0]["name"], "a.txt");
        assert_eq!(json["methods"]["stored"], 1);
    }
}
