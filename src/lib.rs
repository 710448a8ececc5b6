//! zip-pack: ZIP container encoding and decoding
//!
//! This library writes and reads single-disk ZIP archives with stored and
//! deflated entries. Compression and decompression go through pluggable
//! gzip services, and entries can be packed in parallel on a bounded worker
//! pool.

use serde::Serialize;

pub mod buffer;
pub mod cli;
pub mod compression;
pub mod crc;
pub mod envelope;
pub mod error;
pub mod processor;
pub mod scheduler;
pub mod stats;
pub mod time;
pub mod utils;
pub mod worker;
pub mod zip;

pub use error::ZipError;
pub use processor::ParallelPacker;
pub use scheduler::{run_tasks, Scheduler, SchedulerConfig};
pub use zip::{CompressedEntry, Entry, ZipDecoder, ZipEncoder};

/// Result type for zip-pack operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Configuration for packing and unpacking
#[derive(Debug, Clone)]
pub struct Config {
    /// Try deflate before falling back to stored
    pub compress_when_possible: bool,
    /// Maximum entries being compressed at once
    pub max_concurrency: usize,
    /// Threads in the worker pool
    pub thread_count: usize,
    /// Compress entries on the worker pool
    pub parallel: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compress_when_possible: true,
            max_concurrency: num_cpus::get(),
            thread_count: num_cpus::get(),
            parallel: false,
            verbose: false,
        }
    }
}

impl Config {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: self.max_concurrency,
        }
    }

    pub fn worker_config(&self) -> worker::WorkerConfig {
        worker::WorkerConfig {
            thread_count: Some(self.thread_count),
            ..Default::default()
        }
    }
}

/// Compression methods written and read by zip-pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CompressionMethod {
    Stored = 0,
    Deflated = 8,
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::Stored),
            8 => Some(CompressionMethod::Deflated),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflated => f.write_str("deflated"),
        }
    }
}

/// Constants used throughout the library
pub mod constants {
    /// Longest entry name a 16-bit length field can describe
    pub const MAX_NAME_LEN: usize = u16::MAX as usize;
    /// Chunk size for streaming reads
    pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
}
