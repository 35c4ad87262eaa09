//! Concurrency helpers shared by the pipelines.
//!
//! Source reading and document assembly run on blocking tasks connected to the async side
//! through bounded channels (see [`crate::source::stream_table`]). This module holds the
//! remaining coordination pieces.

pub mod retry;
