//! Destinations of the loader.
//!
//! [`TableSink`] receives normalized tables as `COPY` text payloads. [`DocumentSink`]
//! receives assembled company documents.

mod base;
pub mod json_lines;
pub mod memory;
pub mod postgres;

pub use base::{CopyOutcome, DocumentRejection, DocumentSink, InsertManyOutcome, TableSink};
