//! Reading the delimited registry extracts.
//!
//! Files are discovered by prefix, opened as single-entry zip archives or plain files,
//! decoded with the configured [`CsvDialect`] and streamed to async consumers as batches.

mod archive;
mod dialect;
mod discovery;
mod reader;
mod stream;

pub use archive::open_source_file;
pub use dialect::CsvDialect;
pub use discovery::discover_files;
pub use reader::{DelimitedReader, FileScan, scan_file};
pub use stream::{BlockingRows, ReadStats, SkippedFile, TableBatches, stream_table};
