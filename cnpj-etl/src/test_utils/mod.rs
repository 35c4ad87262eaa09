//! Helpers for tests: fixture archives in the registry's file format and ready made
//! configurations.
//!
//! Available to dependent crates through the `test-utils` feature.

pub mod config;
pub mod fixtures;
