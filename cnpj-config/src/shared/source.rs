use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Location and dialect of the delimited source extracts.
///
/// The dialect differs per publishing region, so none of it is hard-coded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    /// Directory holding the downloaded archives.
    pub directory: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_quote")]
    pub quote: char,
    /// Decimal mark of monetary fields. The other of `,` and `.` is the thousands mark.
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    /// WHATWG encoding label, e.g. `latin1` or `utf-8`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub has_header: bool,
}

impl SourceConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            delimiter: default_delimiter(),
            quote: default_quote(),
            decimal_separator: default_decimal_separator(),
            encoding: default_encoding(),
            has_header: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(ValidationError::invalid(
                "source.delimiter",
                "must be a single ASCII character other than a line break",
            ));
        }
        if !self.quote.is_ascii() || self.quote == self.delimiter {
            return Err(ValidationError::invalid(
                "source.quote",
                "must be a single ASCII character different from the delimiter",
            ));
        }
        if self.decimal_separator != ',' && self.decimal_separator != '.' {
            return Err(ValidationError::invalid(
                "source.decimal_separator",
                "must be `,` or `.`",
            ));
        }
        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            return Err(ValidationError::invalid(
                "source.encoding",
                format!("`{}` is not a known encoding label", self.encoding),
            ));
        }

        Ok(())
    }
}

fn default_delimiter() -> char {
    ';'
}

fn default_quote() -> char {
    '"'
}

fn default_decimal_separator() -> char {
    ','
}

fn default_encoding() -> String {
    "latin1".to_string()
}
