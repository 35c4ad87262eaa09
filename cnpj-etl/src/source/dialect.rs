use cnpj_config::shared::SourceConfig;
use encoding_rs::Encoding;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Parsing parameters of the delimited files, resolved from [`SourceConfig`].
#[derive(Debug, Clone, Copy)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    pub decimal_separator: char,
    pub encoding: &'static Encoding,
    pub has_header: bool,
}

impl CsvDialect {
    pub fn from_config(config: &SourceConfig) -> EtlResult<CsvDialect> {
        let Some(encoding) = Encoding::for_label(config.encoding.as_bytes()) else {
            bail!(
                ErrorKind::ConfigError,
                "Unknown source encoding",
                config.encoding
            );
        };

        Ok(CsvDialect {
            delimiter: ascii_byte(config.delimiter, "delimiter")?,
            quote: ascii_byte(config.quote, "quote")?,
            decimal_separator: config.decimal_separator,
            encoding,
            has_header: config.has_header,
        })
    }
}

impl Default for CsvDialect {
    /// The dialect of the published extracts: `;` separated, `"` quoted, Latin-1.
    fn default() -> Self {
        CsvDialect {
            delimiter: b';',
            quote: b'"',
            decimal_separator: ',',
            encoding: encoding_rs::WINDOWS_1252,
            has_header: false,
        }
    }
}

fn ascii_byte(value: char, field: &'static str) -> EtlResult<u8> {
    if !value.is_ascii() {
        bail!(
            ErrorKind::ConfigError,
            "Source dialect characters must be ASCII",
            format!("{field} is `{value}`")
        );
    }

    Ok(value as u8)
}
