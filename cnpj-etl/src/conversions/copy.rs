//! Postgres `COPY` text format.
//!
//! Columns are separated by a tab, rows end with a newline, SQL NULL is written as `\N` and
//! backslash, tab, newline and carriage return inside values are backslash escaped. An empty
//! string and NULL therefore stay distinguishable.

use bytes::{BufMut, BytesMut};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

const NULL_TOKEN: &[u8] = b"\\N";

/// Appends one encoded row, newline included, to `out`.
pub fn encode_copy_row(values: &[Option<String>], out: &mut BytesMut) {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.put_u8(b'\t');
        }

        match value {
            Some(value) => encode_value(value, out),
            None => out.put_slice(NULL_TOKEN),
        }
    }

    out.put_u8(b'\n');
}

fn encode_value(value: &str, out: &mut BytesMut) {
    out.reserve(value.len());
    for byte in value.bytes() {
        match byte {
            b'\\' => out.put_slice(b"\\\\"),
            b'\t' => out.put_slice(b"\\t"),
            b'\n' => out.put_slice(b"\\n"),
            b'\r' => out.put_slice(b"\\r"),
            other => out.put_u8(other),
        }
    }
}

/// Decodes a whole payload produced by [`encode_copy_row`] back into rows.
pub fn decode_copy_payload(payload: &[u8]) -> EtlResult<Vec<Vec<Option<String>>>> {
    let text = std::str::from_utf8(payload).map_err(|err| {
        crate::etl_error!(
            ErrorKind::ConversionError,
            "Copy payload is not valid UTF-8",
            err
        )
    })?;

    let Some(text) = text.strip_suffix('\n') else {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        bail!(
            ErrorKind::InvalidData,
            "Copy payload is not newline terminated"
        );
    };

    text.split('\n').map(decode_copy_line).collect()
}

/// Decodes one row without its trailing newline.
pub fn decode_copy_line(line: &str) -> EtlResult<Vec<Option<String>>> {
    line.split('\t').map(decode_field).collect()
}

fn decode_field(field: &str) -> EtlResult<Option<String>> {
    if field == "\\N" {
        return Ok(None);
    }

    let mut decoded = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }

        match chars.next() {
            Some('t') => decoded.push('\t'),
            Some('n') => decoded.push('\n'),
            Some('r') => decoded.push('\r'),
            Some('b') => decoded.push('\u{8}'),
            Some('f') => decoded.push('\u{c}'),
            Some('v') => decoded.push('\u{b}'),
            Some(other) => decoded.push(other),
            None => bail!(
                ErrorKind::InvalidData,
                "Copy field ends with a dangling escape",
                field
            ),
        }
    }

    Ok(Some(decoded))
}
