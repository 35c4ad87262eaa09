use std::path::PathBuf;

use metrics::counter;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::metrics::{CNPJ_DEFECTS_TOTAL, DEFECT_LABEL, TABLE_NAME_LABEL};
use crate::source::dialect::CsvDialect;
use crate::source::reader::scan_file;
use crate::types::SourceRow;
use crate::{bail, etl_error};

/// Number of batches buffered between the reading task and its consumer.
const BATCHES_IN_FLIGHT: usize = 2;

/// A source file that could not be read and was skipped.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: EtlError,
}

/// Counters of one table read, available once every file has been read.
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    pub files_read: usize,
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub skipped_files: Vec<SkippedFile>,
}

enum SourceMessage {
    Rows(Vec<SourceRow>),
    Finished(ReadStats),
}

/// Starts reading `files` on a blocking task and returns the consuming end.
///
/// Rows are grouped into batches of `batch_size` that span file boundaries, so only the
/// last batch of the table may be shorter. Dropping the returned [`TableBatches`] stops
/// the reading task at its next send.
pub fn stream_table(
    table: impl Into<String>,
    files: Vec<PathBuf>,
    column_count: usize,
    dialect: CsvDialect,
    batch_size: usize,
) -> TableBatches {
    let table = table.into();
    let (sender, receiver) = mpsc::channel(BATCHES_IN_FLIGHT);

    let producer_table = table.clone();
    tokio::task::spawn_blocking(move || {
        read_files(
            &producer_table,
            files,
            column_count,
            dialect,
            batch_size.max(1),
            sender,
        )
    });

    TableBatches {
        table,
        receiver,
        stats: None,
    }
}

fn read_files(
    table: &str,
    files: Vec<PathBuf>,
    column_count: usize,
    dialect: CsvDialect,
    batch_size: usize,
    sender: mpsc::Sender<SourceMessage>,
) {
    let mut stats = ReadStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    for path in files {
        info!(table, file = %path.display(), "reading source file");

        let result = scan_file(&path, column_count, dialect, |row| {
            batch.push(row);
            stats.rows_read += 1;

            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if sender.blocking_send(SourceMessage::Rows(full)).is_err() {
                    bail!(ErrorKind::InvalidState, "Source consumer went away");
                }
            }

            Ok(())
        });

        match result {
            Ok(scan) => {
                stats.files_read += 1;
                stats.malformed_rows += scan.malformed_rows;
                if scan.malformed_rows > 0 {
                    warn!(table, file = %path.display(), malformed_rows = scan.malformed_rows, "skipped malformed rows");
                    counter!(CNPJ_DEFECTS_TOTAL, TABLE_NAME_LABEL => table.to_string(), DEFECT_LABEL => "malformed_row")
                        .increment(scan.malformed_rows);
                }
            }
            Err(_) if sender.is_closed() => return,
            Err(error) => {
                warn!(table, file = %path.display(), error = %error.summary(), "skipping source file");
                counter!(CNPJ_DEFECTS_TOTAL, TABLE_NAME_LABEL => table.to_string(), DEFECT_LABEL => "skipped_file")
                    .increment(1);
                stats.skipped_files.push(SkippedFile { path, error });
            }
        }
    }

    if !batch.is_empty() && sender.blocking_send(SourceMessage::Rows(batch)).is_err() {
        return;
    }

    // The consumer may already be gone, nothing is left to stop in that case.
    let _ = sender.blocking_send(SourceMessage::Finished(stats));
}

/// Consuming end of [`stream_table`].
#[derive(Debug)]
pub struct TableBatches {
    table: String,
    receiver: mpsc::Receiver<SourceMessage>,
    stats: Option<ReadStats>,
}

impl std::fmt::Debug for SourceMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMessage::Rows(rows) => write!(f, "Rows({})", rows.len()),
            SourceMessage::Finished(stats) => write!(f, "Finished({stats:?})"),
        }
    }
}

impl TableBatches {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next batch of rows, `None` once every file has been read.
    pub async fn next_batch(&mut self) -> EtlResult<Option<Vec<SourceRow>>> {
        let message = self.receiver.recv().await;
        self.handle(message)
    }

    /// Blocking variant of [`TableBatches::next_batch`] for use inside blocking tasks.
    pub fn blocking_next_batch(&mut self) -> EtlResult<Option<Vec<SourceRow>>> {
        let message = self.receiver.blocking_recv();
        self.handle(message)
    }

    /// Read counters, set once the last batch has been returned.
    pub fn stats(&self) -> Option<&ReadStats> {
        self.stats.as_ref()
    }

    pub fn take_stats(&mut self) -> ReadStats {
        self.stats.take().unwrap_or_default()
    }

    /// Flattens the batches into a blocking row iterator.
    pub fn into_rows(self) -> BlockingRows {
        BlockingRows {
            batches: self,
            current: Vec::new().into_iter(),
            done: false,
        }
    }

    fn handle(&mut self, message: Option<SourceMessage>) -> EtlResult<Option<Vec<SourceRow>>> {
        match message {
            Some(SourceMessage::Rows(rows)) => Ok(Some(rows)),
            Some(SourceMessage::Finished(stats)) => {
                self.stats = Some(stats);
                Ok(None)
            }
            None if self.stats.is_some() => Ok(None),
            None => Err(etl_error!(
                ErrorKind::WorkerPanic,
                "Source reading task stopped before finishing",
                self.table
            )),
        }
    }
}

/// Row iterator over [`TableBatches`], for use inside blocking tasks.
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug)]
pub struct BlockingRows {
    batches: TableBatches,
    current: std::vec::IntoIter<SourceRow>,
    done: bool,
}

impl BlockingRows {
    pub fn stats(&self) -> Option<&ReadStats> {
        self.batches.stats()
    }
}

impl Iterator for BlockingRows {
    type Item = EtlResult<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current.next() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }

            match self.batches.blocking_next_batch() {
                Ok(Some(batch)) => self.current = batch.into_iter(),
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn write(dir: &Path, name: &str, rows: usize) -> PathBuf {
        let path = dir.join(name);
        let content: String = (0..rows).map(|i| format!("{name}-{i};X\n")).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batches_span_files_and_only_the_last_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write(dir.path(), "Cnaes0.csv", 3),
            write(dir.path(), "Cnaes1.csv", 4),
        ];

        let mut batches = stream_table("cnaes", files, 2, CsvDialect::default(), 2);
        let mut sizes = Vec::new();
        while let Some(batch) = batches.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }

        assert_eq!(sizes, vec![2, 2, 2, 1]);
        let stats = batches.stats().unwrap();
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.rows_read, 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_file_is_skipped_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("Cnaes0.zip");
        std::fs::write(&broken, vec![b'x'; 128]).unwrap();
        let files = vec![broken.clone(), write(dir.path(), "Cnaes1.csv", 1)];

        let mut batches = stream_table("cnaes", files, 2, CsvDialect::default(), 10);
        let mut rows = 0;
        while let Some(batch) = batches.next_batch().await.unwrap() {
            rows += batch.len();
        }

        assert_eq!(rows, 1);
        let stats = batches.take_stats();
        assert_eq!(stats.skipped_files.len(), 1);
        assert_eq!(stats.skipped_files[0].path, broken);
        assert_eq!(stats.skipped_files[0].error.kind(), ErrorKind::ArchiveFormat);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_rows_flatten_batches() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![write(dir.path(), "Paises.csv", 5)];

        let batches = stream_table("paises", files, 2, CsvDialect::default(), 2);
        let rows = tokio::task::spawn_blocking(move || {
            batches.into_rows().collect::<EtlResult<Vec<_>>>()
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].get(0), Some("Paises.csv-4"));
    }
}
