//! Text conversions: registry field parsers used during assembly and the `COPY` text codec
//! used by the bulk loader.

pub mod code;
pub mod copy;
pub mod date;
pub mod decimal;
