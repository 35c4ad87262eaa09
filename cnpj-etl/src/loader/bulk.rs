use std::time::Instant;

use bytes::BytesMut;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::conversions::copy::encode_copy_row;
use crate::destination::TableSink;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::metrics::{
    CNPJ_BATCH_SEND_DURATION_SECONDS, CNPJ_ROWS_LOADED_TOTAL, CNPJ_ROWS_REJECTED_TOTAL,
    DESTINATION_LABEL, TABLE_NAME_LABEL,
};
use crate::types::{SourceRow, TableName, TableSchema};

/// Destructive operations the operator agreed to before the run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub recreate_on_mismatch: bool,
    pub truncate_existing: bool,
}

impl Default for ResolvedPolicy {
    fn default() -> Self {
        Self {
            recreate_on_mismatch: true,
            truncate_existing: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateOutcome {
    /// The table held `removed` rows which were deleted.
    Truncated { removed: u64 },
    /// New rows are appended to the `existing` ones.
    Appending { existing: u64 },
}

/// Result of loading one batch.
///
/// A rejected batch is not an error of the load: its rows are counted as rejected and the
/// cause is kept in `errors`.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub accepted: u64,
    pub rejected: u64,
    pub errors: Vec<EtlError>,
}

/// Streams batches of one table at a time into a [`TableSink`].
#[derive(Debug, Clone)]
pub struct BulkLoader<S> {
    sink: S,
    policy: ResolvedPolicy,
}

impl<S> BulkLoader<S>
where
    S: TableSink,
{
    pub fn new(sink: S, policy: ResolvedPolicy) -> BulkLoader<S> {
        BulkLoader { sink, policy }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn policy(&self) -> ResolvedPolicy {
        self.policy
    }

    /// Makes sure the destination table has exactly the declared columns, in order.
    ///
    /// Returns `false` when the live table differs and recreating it is not allowed, in
    /// which case the table is left untouched.
    pub async fn ensure_schema(&self, schema: &TableSchema) -> EtlResult<bool> {
        let Some(live_columns) = self.sink.describe_columns(&schema.name).await? else {
            self.sink.create_table(schema).await?;
            info!(table = %schema.name, "created table");
            return Ok(true);
        };

        if schema.matches_columns(&live_columns) {
            return Ok(true);
        }

        if !self.policy.recreate_on_mismatch {
            warn!(
                table = %schema.name,
                live = ?live_columns,
                "table columns differ from the declaration and recreating is not allowed"
            );
            return Ok(false);
        }

        warn!(table = %schema.name, live = ?live_columns, "recreating table with mismatched columns");
        self.sink.drop_table(&schema.name).await?;
        self.sink.create_table(schema).await?;

        Ok(true)
    }

    /// Empties `table` when it holds rows and the policy allows it.
    pub async fn truncate_if_requested(&self, table: &TableName) -> EtlResult<TruncateOutcome> {
        let existing = self.sink.count_rows(table).await?;
        if existing == 0 || !self.policy.truncate_existing {
            if existing > 0 {
                info!(%table, existing, "appending to existing rows");
            }
            return Ok(TruncateOutcome::Appending { existing });
        }

        self.sink.truncate_table(table).await?;
        info!(%table, removed = existing, "truncated table");

        Ok(TruncateOutcome::Truncated { removed: existing })
    }

    /// Transfers `rows` as one `COPY` payload.
    ///
    /// Data problems reject the batch and are reported. Any other failure is returned and
    /// ends the load of the table.
    pub async fn load_batch(
        &self,
        schema: &TableSchema,
        rows: Vec<SourceRow>,
    ) -> EtlResult<BatchReport> {
        let mut report = BatchReport::default();
        if rows.is_empty() {
            return Ok(report);
        }

        let column_count = schema.column_count();
        let mut payload = BytesMut::with_capacity(rows.len() * column_count * 16);
        let mut encoded_rows = 0;
        for row in rows {
            if row.len() != column_count {
                report.rejected += 1;
                report.errors.push(etl_error!(
                    ErrorKind::ConversionError,
                    "Row width differs from the table schema",
                    format!("{} values for {column_count} columns", row.len())
                ));
                continue;
            }

            encode_copy_row(row.values(), &mut payload);
            encoded_rows += 1;
        }

        if encoded_rows > 0 {
            let started = Instant::now();
            let result = self
                .sink
                .copy_rows(schema, payload.freeze(), encoded_rows)
                .await;

            histogram!(
                CNPJ_BATCH_SEND_DURATION_SECONDS,
                TABLE_NAME_LABEL => schema.name.name.clone(),
                DESTINATION_LABEL => S::name(),
            )
            .record(started.elapsed().as_secs_f64());

            match result {
                Ok(outcome) => {
                    report.accepted += outcome.accepted;
                    report.rejected += outcome.rejected;
                }
                Err(err) if err.kind().is_batch_scoped() => {
                    warn!(
                        table = %schema.name,
                        rows = encoded_rows,
                        error = %err.summary(),
                        "batch rejected by the destination"
                    );
                    report.rejected += encoded_rows as u64;
                    report.errors.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        counter!(
            CNPJ_ROWS_LOADED_TOTAL,
            TABLE_NAME_LABEL => schema.name.name.clone(),
            DESTINATION_LABEL => S::name(),
        )
        .increment(report.accepted);

        if report.rejected > 0 {
            counter!(
                CNPJ_ROWS_REJECTED_TOTAL,
                TABLE_NAME_LABEL => schema.name.name.clone(),
                DESTINATION_LABEL => S::name(),
            )
            .increment(report.rejected);
        }

        Ok(report)
    }
}
