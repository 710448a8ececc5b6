mod decoder;
mod encoder;
mod entry;
pub mod header;
mod reader;
mod writer;

pub use decoder::ZipDecoder;
pub use encoder::ZipEncoder;
pub use entry::{CompressedEntry, Entry};
pub use header::LocalFileHeader;
pub use reader::LocalEntries;
