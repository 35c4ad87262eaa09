use std::fmt;

use crate::error::EtlError;
use crate::loader::TruncateOutcome;
use crate::source::{ReadStats, SkippedFile};

/// Progress of one table through a run.
///
/// Tables move `Pending → SchemaReady → Truncated | Appending → Loading → Done`. `Failed`
/// can be reached from any phase and keeps the phase the failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePhase {
    Pending,
    SchemaReady,
    Truncated,
    Appending,
    Loading,
    Done,
    Failed { during: FailedPhase },
}

/// Phase a failed table was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedPhase {
    Discovery,
    Schema,
    Truncate,
    Loading,
}

impl fmt::Display for TablePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TablePhase::Pending => f.write_str("pending"),
            TablePhase::SchemaReady => f.write_str("schema_ready"),
            TablePhase::Truncated => f.write_str("truncated"),
            TablePhase::Appending => f.write_str("appending"),
            TablePhase::Loading => f.write_str("loading"),
            TablePhase::Done => f.write_str("done"),
            TablePhase::Failed { during } => write!(f, "failed ({during:?})"),
        }
    }
}

/// Everything recorded about one table during a run.
#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table: String,
    pub phase: TablePhase,
    pub truncate: Option<TruncateOutcome>,
    pub batches: u64,
    pub rows_read: u64,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    /// Malformed source rows skipped while reading.
    pub row_defects: u64,
    pub skipped_files: Vec<SkippedFile>,
    /// Causes of rejected batches.
    pub batch_errors: Vec<EtlError>,
    /// Live row count read after the run, for tables whose schema was ensured.
    pub live_rows: Option<u64>,
    pub error: Option<EtlError>,
}

impl TableOutcome {
    pub fn new(table: impl Into<String>) -> TableOutcome {
        TableOutcome {
            table: table.into(),
            phase: TablePhase::Pending,
            truncate: None,
            batches: 0,
            rows_read: 0,
            rows_loaded: 0,
            rows_rejected: 0,
            row_defects: 0,
            skipped_files: Vec::new(),
            batch_errors: Vec::new(),
            live_rows: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.phase == TablePhase::Done
    }

    /// Whether the destination table exists with the declared columns, even if loading it
    /// failed afterwards.
    pub fn has_schema(&self) -> bool {
        !matches!(
            self.phase,
            TablePhase::Pending
                | TablePhase::Failed {
                    during: FailedPhase::Discovery | FailedPhase::Schema
                }
        )
    }

    pub(crate) fn fail(&mut self, during: FailedPhase, error: EtlError) {
        self.phase = TablePhase::Failed { during };
        self.error = Some(error);
    }

    pub(crate) fn record_read(&mut self, stats: ReadStats) {
        self.rows_read += stats.rows_read;
        self.row_defects += stats.malformed_rows;
        self.skipped_files.extend(stats.skipped_files);
    }
}

/// A best effort post-load step that failed, e.g. one index.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: String,
    pub error: EtlError,
}

/// Aggregate result of a relational run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub tables: Vec<TableOutcome>,
    pub indexes_created: usize,
    pub step_failures: Vec<StepFailure>,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.tables.iter().filter(|table| table.is_success()).count()
    }

    pub fn total_count(&self) -> usize {
        self.tables.len()
    }

    /// Whether every table loaded. Best effort step failures do not count.
    pub fn is_success(&self) -> bool {
        self.success_count() == self.total_count()
    }

    pub fn table(&self, name: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|table| table.table == name)
    }

    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().map(|table| table.rows_loaded).sum()
    }
}

/// Aggregate result of a document run.
#[derive(Debug, Clone, Default)]
pub struct DocumentSummary {
    pub collection: String,
    /// Outcomes of the source tables read, parent first.
    pub tables: Vec<TableOutcome>,
    pub missing_lookups: Vec<String>,
    pub documents_assembled: u64,
    pub documents_written: u64,
    pub documents_rejected: u64,
    /// Parent rows that could not be assembled.
    pub assembly_defects: u64,
    /// Child rows whose key matched no parent, known for sorted merge joins only.
    pub orphan_rows: u64,
    /// Child rows without a key.
    pub ungrouped_rows: u64,
    pub live_documents: Option<u64>,
    pub error: Option<EtlError>,
}

impl DocumentSummary {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::etl_error;

    #[test]
    fn summary_counts_done_tables_only() {
        let mut done = TableOutcome::new("paises");
        done.phase = TablePhase::Done;
        let mut failed = TableOutcome::new("empresas");
        failed.fail(
            FailedPhase::Schema,
            etl_error!(ErrorKind::SchemaMismatch, "columns differ"),
        );

        let summary = RunSummary {
            tables: vec![done, failed],
            ..RunSummary::default()
        };

        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.total_count(), 2);
        assert!(!summary.is_success());
        assert_eq!(
            summary.table("empresas").unwrap().phase.to_string(),
            "failed (Schema)"
        );
    }

    #[test]
    fn tables_failing_after_schema_still_have_one() {
        let failed_in = |during| {
            let mut outcome = TableOutcome::new("empresas");
            outcome.fail(during, etl_error!(ErrorKind::DestinationQueryFailed, "failed"));
            outcome
        };

        assert!(!TableOutcome::new("empresas").has_schema());
        assert!(!failed_in(FailedPhase::Discovery).has_schema());
        assert!(!failed_in(FailedPhase::Schema).has_schema());
        assert!(failed_in(FailedPhase::Truncate).has_schema());
        assert!(failed_in(FailedPhase::Loading).has_schema());
    }
}
