//! Batch bulk loading of normalized tables.

mod bulk;

pub use bulk::{BatchReport, BulkLoader, ResolvedPolicy, TruncateOutcome};
