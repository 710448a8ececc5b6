use std::sync::Arc;

use crate::{
    zip::{CompressedEntry, Entry, ZipEncoder},
    Result,
};

/// Compression of a single entry, packaged to run on a worker thread
#[derive(Debug, Clone)]
pub struct CompressionTask {
    entry: Entry,
    encoder: Arc<ZipEncoder>,
}

impl CompressionTask {
    pub fn new(entry: Entry, encoder: Arc<ZipEncoder>) -> Self {
        Self { entry, encoder }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Uncompressed bytes this task covers
    pub fn size(&self) -> u64 {
        self.entry.size() as u64
    }

    pub fn run(self) -> Result<CompressedEntry> {
        self.encoder.compress_entry(&self.entry)
    }
}
