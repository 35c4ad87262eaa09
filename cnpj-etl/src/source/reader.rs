use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::source::archive::open_source_file;
use crate::source::dialect::CsvDialect;
use crate::types::SourceRow;
use crate::{bail, etl_error};

/// Iterator over the rows of one delimited file.
///
/// Fields are decoded with the dialect's encoding and bound positionally to a schema of
/// `column_count` columns. Short rows are padded with nulls. Rows with more fields than the
/// schema yield an [`ErrorKind::InvalidData`] error and the iterator moves on to the next
/// row.
pub struct DelimitedReader<R: Read> {
    reader: csv::Reader<R>,
    record: ByteRecord,
    dialect: CsvDialect,
    column_count: usize,
    done: bool,
}

impl<R: Read> DelimitedReader<R> {
    pub fn new(source: R, dialect: CsvDialect, column_count: usize) -> DelimitedReader<R> {
        let reader = ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .quote(dialect.quote)
            .has_headers(dialect.has_header)
            .flexible(true)
            .from_reader(source);

        DelimitedReader {
            reader,
            record: ByteRecord::new(),
            dialect,
            column_count,
            done: false,
        }
    }

    fn decode_record(&self) -> EtlResult<SourceRow> {
        if self.record.len() > self.column_count {
            let line = self.record.position().map(|p| p.line()).unwrap_or_default();
            bail!(
                ErrorKind::InvalidData,
                "Row has more fields than the table declares",
                format!(
                    "line {line}: {} fields, {} columns",
                    self.record.len(),
                    self.column_count
                )
            );
        }

        let mut values = Vec::with_capacity(self.column_count);
        for field in self.record.iter() {
            if field.is_empty() {
                values.push(None);
                continue;
            }

            let (decoded, _) = self.dialect.encoding.decode_without_bom_handling(field);
            values.push(Some(decoded.into_owned()));
        }
        values.resize(self.column_count, None);

        Ok(SourceRow::new(values))
    }
}

impl<R: Read> Iterator for DelimitedReader<R> {
    type Item = EtlResult<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(self.decode_record()),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                // An I/O failure leaves the underlying reader in an unknown position.
                if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                    self.done = true;
                }
                Some(Err(err.into()))
            }
        }
    }
}

/// Counters of one file read by [`scan_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileScan {
    pub rows: u64,
    pub malformed_rows: u64,
}

/// Reads every row of the file at `path` and passes it to `visit`.
///
/// Malformed rows are counted and skipped. Any other failure, including one returned by
/// `visit`, aborts the file.
pub fn scan_file<F>(
    path: &Path,
    column_count: usize,
    dialect: CsvDialect,
    mut visit: F,
) -> EtlResult<FileScan>
where
    F: FnMut(SourceRow) -> EtlResult<()>,
{
    open_source_file(path, |source| {
        let mut scan = FileScan::default();

        for row in DelimitedReader::new(source, dialect, column_count) {
            match row {
                Ok(row) => {
                    visit(row)?;
                    scan.rows += 1;
                }
                Err(err) if err.kind() == ErrorKind::InvalidData => {
                    debug!(file = %path.display(), error = %err.summary(), "skipping malformed row");
                    scan.malformed_rows += 1;
                }
                Err(err) => {
                    return Err(etl_error!(
                        err.kind(),
                        "Reading source file failed",
                        format!("{}: {}", path.display(), err.summary())
                    ));
                }
            }
        }

        Ok(scan)
    })
}
