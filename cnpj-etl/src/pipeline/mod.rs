//! Orchestration of whole runs.
//!
//! [`RelationalPipeline`] loads the declared tables one after the other into a
//! [`crate::destination::TableSink`]. [`DocumentPipeline`] assembles company documents into a
//! [`crate::destination::DocumentSink`]. Both return a summary instead of failing on the first
//! table that goes wrong.

mod documents;
mod relational;
mod state;

pub use documents::DocumentPipeline;
pub use relational::RelationalPipeline;
pub use state::{
    DocumentSummary, FailedPhase, RunSummary, StepFailure, TableOutcome, TablePhase,
};
