//! Bulk loading and document assembly for the Brazilian company registry extracts.
//!
//! Two paths share the same source layer. The relational path streams every declared table
//! into a [`destination::TableSink`] in bounded batches using the Postgres `COPY` text
//! format. The document path groups child tables by company key, joins them with the
//! reference lookups and writes one nested document per company into a
//! [`destination::DocumentSink`].

pub mod assembler;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
pub mod grouping;
pub mod loader;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod reference;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
