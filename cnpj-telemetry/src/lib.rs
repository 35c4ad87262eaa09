//! Logging setup shared by the loader binary and the tests.

pub mod tracing;
