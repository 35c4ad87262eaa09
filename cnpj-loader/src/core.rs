use std::sync::Arc;

use cnpj_config::shared::{DestinationConfig, LoaderConfig};
use cnpj_etl::concurrency::retry::retry_with_fixed_delay;
use cnpj_etl::destination::json_lines::{DuplicateCheck, JsonLinesSink};
use cnpj_etl::destination::memory::MemorySink;
use cnpj_etl::destination::postgres::PostgresSink;
use cnpj_etl::loader::ResolvedPolicy;
use cnpj_etl::pipeline::{DocumentPipeline, DocumentSummary, RelationalPipeline, RunSummary};
use tracing::{info, warn};

use crate::error::LoaderResult;

/// Whether every table (or the document collection) was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    Incomplete,
}

/// Runs the pipeline matching the configured destination.
pub async fn start_loader_with_config(
    config: LoaderConfig,
    policy: ResolvedPolicy,
) -> LoaderResult<RunStatus> {
    info!("starting registry loader");

    log_config(&config);

    let config = Arc::new(config);

    // Static dispatch per destination.
    let status = match &config.destination {
        DestinationConfig::Postgres(postgres) => {
            let sink = retry_with_fixed_delay("postgres", &postgres.connect_retry, |attempt| {
                info!(attempt, host = %postgres.connection.host, "connecting to postgres");
                PostgresSink::connect(&postgres.connection)
            })
            .await?;

            let pipeline =
                RelationalPipeline::new(config.clone(), postgres.schema.clone(), sink, policy)?;
            log_run_summary(&pipeline.run().await)
        }
        DestinationConfig::Memory => {
            let pipeline =
                RelationalPipeline::new(config.clone(), "public", MemorySink::new(), policy)?;
            log_run_summary(&pipeline.run().await)
        }
        DestinationConfig::JsonLines(json_lines) => {
            let sink = JsonLinesSink::new(
                &json_lines.output_dir,
                DuplicateCheck::from_config(json_lines),
            )
            .await?;

            let pipeline = DocumentPipeline::new(
                config.clone(),
                sink,
                json_lines.collection.clone(),
                json_lines.join_strategy,
                policy.truncate_existing,
            )?;
            log_document_summary(&pipeline.run().await)
        }
    };

    info!(status = ?status, "registry loader finished");

    Ok(status)
}

fn log_config(config: &LoaderConfig) {
    info!(
        directory = %config.source.directory.display(),
        delimiter = %config.source.delimiter,
        encoding = %config.source.encoding,
        batch_size = config.batch.max_size,
        tables = config.tables.len(),
        recreate = %config.policy.recreate,
        truncate = %config.policy.truncate,
        "loader configuration"
    );

    match &config.destination {
        DestinationConfig::Postgres(postgres) => info!(
            host = %postgres.connection.host,
            port = postgres.connection.port,
            database = %postgres.connection.name,
            schema = %postgres.schema,
            tls = postgres.connection.tls.enabled,
            "destination: postgres"
        ),
        DestinationConfig::JsonLines(json_lines) => info!(
            output_dir = %json_lines.output_dir.display(),
            collection = %json_lines.collection,
            join_strategy = ?json_lines.join_strategy,
            track_all_ids = json_lines.track_all_ids,
            "destination: json lines"
        ),
        DestinationConfig::Memory => info!("destination: memory"),
    }
}

fn log_run_summary(summary: &RunSummary) -> RunStatus {
    for table in &summary.tables {
        match &table.error {
            None => info!(
                table = %table.table,
                phase = %table.phase,
                rows_loaded = table.rows_loaded,
                rows_rejected = table.rows_rejected,
                row_defects = table.row_defects,
                skipped_files = table.skipped_files.len(),
                live_rows = ?table.live_rows,
                "table summary"
            ),
            Some(err) => warn!(
                table = %table.table,
                phase = %table.phase,
                rows_loaded = table.rows_loaded,
                error = %err.summary(),
                "table summary"
            ),
        }
    }

    for failure in &summary.step_failures {
        warn!(step = %failure.step, error = %failure.error.summary(), "post-load step failed");
    }

    info!(
        "{}/{} tables loaded, {} rows, {} indexes",
        summary.success_count(),
        summary.total_count(),
        summary.rows_loaded(),
        summary.indexes_created
    );

    if summary.is_success() {
        RunStatus::Complete
    } else {
        RunStatus::Incomplete
    }
}

fn log_document_summary(summary: &DocumentSummary) -> RunStatus {
    for table in &summary.tables {
        info!(
            table = %table.table,
            rows_read = table.rows_read,
            row_defects = table.row_defects,
            skipped_files = table.skipped_files.len(),
            "source table summary"
        );
    }

    if !summary.missing_lookups.is_empty() {
        warn!(lookups = ?summary.missing_lookups, "documents were built without some lookups");
    }

    info!(
        collection = %summary.collection,
        documents_assembled = summary.documents_assembled,
        documents_written = summary.documents_written,
        documents_rejected = summary.documents_rejected,
        assembly_defects = summary.assembly_defects,
        orphan_rows = summary.orphan_rows,
        ungrouped_rows = summary.ungrouped_rows,
        live_documents = ?summary.live_documents,
        "document summary"
    );

    match &summary.error {
        None => RunStatus::Complete,
        Some(err) => {
            warn!(collection = %summary.collection, error = %err.summary(), "document run failed");
            RunStatus::Incomplete
        }
    }
}
