use std::sync::Arc;

use cnpj_config::shared::{LoaderConfig, TableConfig};
use tracing::{error, info, warn};

use crate::destination::TableSink;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::loader::{BulkLoader, ResolvedPolicy, TruncateOutcome};
use crate::pipeline::state::{FailedPhase, RunSummary, StepFailure, TableOutcome, TablePhase};
use crate::source::{CsvDialect, discover_files, stream_table};
use crate::types::TableSchema;

/// Loads every declared table, in declaration order, into a [`TableSink`].
///
/// A failing table is recorded and the next table starts. Indexes and statistics are
/// handled once after the last table, for the tables that loaded.
#[derive(Debug)]
pub struct RelationalPipeline<S> {
    config: Arc<LoaderConfig>,
    schema: String,
    dialect: CsvDialect,
    loader: BulkLoader<S>,
}

impl<S> RelationalPipeline<S>
where
    S: TableSink + Clone + Send + Sync + 'static,
{
    pub fn new(
        config: Arc<LoaderConfig>,
        schema: impl Into<String>,
        sink: S,
        policy: ResolvedPolicy,
    ) -> EtlResult<RelationalPipeline<S>> {
        let dialect = CsvDialect::from_config(&config.source)?;

        Ok(RelationalPipeline {
            config,
            schema: schema.into(),
            dialect,
            loader: BulkLoader::new(sink, policy),
        })
    }

    pub async fn run(&self) -> RunSummary {
        info!(
            tables = self.config.tables.len(),
            destination = S::name(),
            "starting relational load"
        );

        let mut summary = RunSummary::default();
        let mut finished_schemas = Vec::new();

        for table in &self.config.tables {
            let schema = TableSchema::from_config(&self.schema, table);
            let mut outcome = TableOutcome::new(&table.name);

            self.load_table(table, &schema, &mut outcome).await;

            if outcome.is_success() {
                info!(
                    table = %table.name,
                    rows_loaded = outcome.rows_loaded,
                    rows_rejected = outcome.rows_rejected,
                    row_defects = outcome.row_defects,
                    skipped_files = outcome.skipped_files.len(),
                    "table loaded"
                );
            } else if let Some(err) = &outcome.error {
                error!(table = %table.name, phase = %outcome.phase, error = %err, "table failed");
            }

            // Partially loaded tables still get their indexes and live counts.
            if outcome.has_schema() {
                finished_schemas.push(schema);
            }

            summary.tables.push(outcome);
        }

        if !finished_schemas.is_empty() {
            self.finish_tables(&finished_schemas, &mut summary).await;
        }

        info!(
            success = summary.success_count(),
            total = summary.total_count(),
            rows_loaded = summary.rows_loaded(),
            "relational load finished"
        );

        summary
    }

    async fn load_table(&self, table: &TableConfig, schema: &TableSchema, outcome: &mut TableOutcome) {
        // We discover files first so that a table without sources is never truncated.
        let prefix = table.file_prefix();
        let files = match discover_files(&self.config.source.directory, &prefix) {
            Ok(files) if files.is_empty() => {
                outcome.fail(
                    FailedPhase::Discovery,
                    etl_error!(
                        ErrorKind::MissingSource,
                        "No source files found for table",
                        format!("prefix `{prefix}` in {}", self.config.source.directory.display())
                    ),
                );
                return;
            }
            Ok(files) => files,
            Err(err) => {
                outcome.fail(FailedPhase::Discovery, err);
                return;
            }
        };
        info!(table = %table.name, files = files.len(), "discovered source files");

        match self.loader.ensure_schema(schema).await {
            Ok(true) => outcome.phase = TablePhase::SchemaReady,
            Ok(false) => {
                outcome.fail(
                    FailedPhase::Schema,
                    etl_error!(
                        ErrorKind::SchemaMismatch,
                        "Destination table columns differ from the declaration",
                        schema.name
                    ),
                );
                return;
            }
            Err(err) => {
                outcome.fail(FailedPhase::Schema, err);
                return;
            }
        }

        match self.loader.truncate_if_requested(&schema.name).await {
            Ok(truncate) => {
                outcome.phase = match truncate {
                    TruncateOutcome::Truncated { .. } => TablePhase::Truncated,
                    TruncateOutcome::Appending { .. } => TablePhase::Appending,
                };
                outcome.truncate = Some(truncate);
            }
            Err(err) => {
                outcome.fail(FailedPhase::Truncate, err);
                return;
            }
        }

        outcome.phase = TablePhase::Loading;
        let mut batches = stream_table(
            table.name.clone(),
            files,
            schema.column_count(),
            self.dialect,
            self.config.batch.max_size,
        );

        loop {
            let batch = match batches.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    outcome.fail(FailedPhase::Loading, err);
                    return;
                }
            };

            match self.loader.load_batch(schema, batch).await {
                Ok(report) => {
                    outcome.batches += 1;
                    outcome.rows_loaded += report.accepted;
                    outcome.rows_rejected += report.rejected;
                    outcome.batch_errors.extend(report.errors);
                }
                Err(err) => {
                    // Dropping the batches stops the reading task.
                    outcome.record_read(batches.take_stats());
                    outcome.fail(FailedPhase::Loading, err);
                    return;
                }
            }
        }

        outcome.record_read(batches.take_stats());
        outcome.phase = TablePhase::Done;
    }

    /// Index creation, statistics and live counts for every table whose schema was ensured.
    /// Every step is best effort.
    async fn finish_tables(&self, schemas: &[TableSchema], summary: &mut RunSummary) {
        let sink = self.loader.sink();

        if let Err(err) = sink.prepare().await {
            warn!(error = %err.summary(), "preparing the destination for indexes failed");
            summary.step_failures.push(StepFailure {
                step: "prepare".to_string(),
                error: err,
            });
        }

        for schema in schemas {
            for index in schema.index_schemas() {
                match sink.create_index(&index).await {
                    Ok(()) => {
                        info!(table = %schema.name, index = %index.name, "created index");
                        summary.indexes_created += 1;
                    }
                    Err(err) => {
                        warn!(table = %schema.name, index = %index.name, error = %err.summary(), "index creation failed");
                        summary.step_failures.push(StepFailure {
                            step: format!("index {}", index.name),
                            error: err,
                        });
                    }
                }
            }
        }

        if let Err(err) = sink.analyze().await {
            warn!(error = %err.summary(), "analyze failed");
            summary.step_failures.push(StepFailure {
                step: "analyze".to_string(),
                error: err,
            });
        }

        for schema in schemas {
            let live_rows = match sink.count_rows(&schema.name).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(table = %schema.name, error = %err.summary(), "counting rows failed");
                    continue;
                }
            };

            if let Some(outcome) = summary
                .tables
                .iter_mut()
                .find(|outcome| outcome.table == schema.name.name)
            {
                outcome.live_rows = Some(live_rows);
            }
        }
    }
}
