use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use cnpj_config::shared::{JoinStrategy, LoaderConfig, title_case};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::assembler::layout::{empresas, estabelecimentos, simples, socios};
use crate::assembler::{Assembler, Document};
use crate::destination::DocumentSink;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::grouping::{GroupLookup, GroupedTable, SortedGroupCursor};
use crate::metrics::{
    CNPJ_DEFECTS_TOTAL, CNPJ_DOCUMENTS_ASSEMBLED_TOTAL, DEFECT_LABEL, TABLE_NAME_LABEL,
};
use crate::pipeline::state::{DocumentSummary, TableOutcome, TablePhase};
use crate::reference::{LookupKind, Lookups, load_lookup};
use crate::source::{BlockingRows, CsvDialect, ReadStats, TableBatches, discover_files, stream_table};
use crate::types::{GroupKey, SourceRow};
use crate::{bail, etl_error};

/// Number of document batches buffered between assembly and the sink writer.
const DOCUMENT_BATCHES_IN_FLIGHT: usize = 2;

const COMPANIES: &str = "empresas";
const ESTABLISHMENTS: &str = "estabelecimentos";
const PARTNERS: &str = "socios";
const SIMPLES: &str = "simples";

/// Field indexed in the collection, equal to `cnpj_basico`.
const ID_FIELD: &str = "_id";

/// Builds one nested document per company and writes them into a [`DocumentSink`].
///
/// Lookups are loaded first and are best effort. `empresas` and `estabelecimentos` are
/// required, `socios` and `simples` are joined when present. Grouping and assembly run on a
/// blocking task which hands document batches to the async writer over a bounded channel.
#[derive(Debug)]
pub struct DocumentPipeline<D> {
    config: Arc<LoaderConfig>,
    dialect: CsvDialect,
    sink: D,
    collection: String,
    join_strategy: JoinStrategy,
    clear_existing: bool,
}

impl<D> DocumentPipeline<D>
where
    D: DocumentSink + Clone + Send + Sync + 'static,
{
    pub fn new(
        config: Arc<LoaderConfig>,
        sink: D,
        collection: impl Into<String>,
        join_strategy: JoinStrategy,
        clear_existing: bool,
    ) -> EtlResult<DocumentPipeline<D>> {
        let dialect = CsvDialect::from_config(&config.source)?;

        Ok(DocumentPipeline {
            config,
            dialect,
            sink,
            collection: collection.into(),
            join_strategy,
            clear_existing,
        })
    }

    pub async fn run(&self) -> DocumentSummary {
        info!(
            collection = %self.collection,
            join_strategy = ?self.join_strategy,
            destination = D::name(),
            "starting document assembly"
        );

        let mut summary = DocumentSummary {
            collection: self.collection.clone(),
            ..DocumentSummary::default()
        };

        match self.assemble_into_sink(&mut summary).await {
            Ok(()) => info!(
                collection = %self.collection,
                documents_written = summary.documents_written,
                documents_rejected = summary.documents_rejected,
                assembly_defects = summary.assembly_defects,
                "document assembly finished"
            ),
            Err(err) => {
                error!(collection = %self.collection, error = %err, "document assembly failed");
                summary.error = Some(err);
            }
        }

        summary
    }

    async fn assemble_into_sink(&self, summary: &mut DocumentSummary) -> EtlResult<()> {
        let lookups = self.load_lookups(summary).await?;

        let companies = self.discover(COMPANIES)?;
        let establishments = self.discover(ESTABLISHMENTS)?;
        let partners = self.discover_optional(PARTNERS);
        let simples_files = self.discover_optional(SIMPLES);

        self.prepare_collection().await?;

        let batch_size = self.config.batch.max_size.max(1);
        let sources = Sources {
            companies: stream_table(COMPANIES, companies, empresas::COLUMNS, self.dialect, batch_size),
            establishments: stream_table(
                ESTABLISHMENTS,
                establishments,
                estabelecimentos::COLUMNS,
                self.dialect,
                batch_size,
            ),
            partners: partners
                .map(|files| stream_table(PARTNERS, files, socios::COLUMNS, self.dialect, batch_size)),
            simples: simples_files
                .map(|files| stream_table(SIMPLES, files, simples::COLUMNS, self.dialect, batch_size)),
        };

        let assembler = Assembler::new(lookups, self.dialect.decimal_separator);
        let join_strategy = self.join_strategy;
        let (sender, mut receiver) = mpsc::channel(DOCUMENT_BATCHES_IN_FLIGHT);
        let assembly = tokio::task::spawn_blocking(move || {
            assemble_documents(sources, join_strategy, &assembler, batch_size, sender)
        });

        let written = self.write_documents(&mut receiver, summary).await;
        // Closing the channel stops the assembly task if the writer gave up early.
        drop(receiver);

        let report = assembly.await.map_err(|err| {
            etl_error!(
                ErrorKind::WorkerPanic,
                "Document assembly task panicked",
                err
            )
        })?;
        summary.tables.extend(report.tables);
        summary.documents_assembled += report.documents_assembled;
        summary.assembly_defects += report.assembly_defects;
        summary.orphan_rows += report.orphan_rows;
        summary.ungrouped_rows += report.ungrouped_rows;

        let flushed = self.sink.flush().await;
        written?;
        if let Some(err) = report.error {
            return Err(err);
        }
        flushed?;

        if let Err(err) = self.sink.create_index(&self.collection, ID_FIELD).await {
            warn!(collection = %self.collection, error = %err.summary(), "creating the _id index failed");
        }
        summary.live_documents = Some(self.sink.count_documents(&self.collection).await?);

        Ok(())
    }

    /// Loads every lookup table. A missing one only disables its enrichment.
    async fn load_lookups(&self, summary: &mut DocumentSummary) -> EtlResult<Lookups> {
        let mut lookups = Lookups::new();

        for kind in LookupKind::ALL {
            let files = discover_files(&self.config.source.directory, &self.file_prefix(kind.table_name()))
                .unwrap_or_default();
            let dialect = self.dialect;

            let loaded = tokio::task::spawn_blocking(move || load_lookup(kind, &files, dialect))
                .await
                .map_err(|err| {
                    etl_error!(ErrorKind::WorkerPanic, "Lookup loading task panicked", err)
                })?;

            match loaded {
                Ok(lookup) => {
                    info!(lookup = %kind, entries = lookup.len(), "loaded lookup");
                    lookups.insert(lookup);
                }
                Err(err) => {
                    warn!(lookup = %kind, error = %err.summary(), "lookup unavailable, enrichment disabled");
                    summary.missing_lookups.push(kind.table_name().to_string());
                }
            }
        }

        Ok(lookups)
    }

    fn file_prefix(&self, table: &str) -> String {
        match self.config.table(table) {
            Some(config) => config.file_prefix(),
            None => title_case(table),
        }
    }

    fn discover(&self, table: &str) -> EtlResult<Vec<PathBuf>> {
        let prefix = self.file_prefix(table);
        let files = discover_files(&self.config.source.directory, &prefix)?;
        if files.is_empty() {
            bail!(
                ErrorKind::MissingSource,
                "Required table has no source files",
                format!("{table} (prefix `{prefix}`)")
            );
        }

        info!(table, files = files.len(), "discovered source files");
        Ok(files)
    }

    fn discover_optional(&self, table: &str) -> Option<Vec<PathBuf>> {
        match self.discover(table) {
            Ok(files) => Some(files),
            Err(err) => {
                warn!(table, error = %err.summary(), "optional table unavailable, documents will not include it");
                None
            }
        }
    }

    async fn prepare_collection(&self) -> EtlResult<()> {
        let existing = self.sink.count_documents(&self.collection).await?;
        if existing == 0 {
            return Ok(());
        }

        if self.clear_existing {
            self.sink.clear_collection(&self.collection).await?;
            info!(collection = %self.collection, removed = existing, "cleared collection");
        } else {
            info!(collection = %self.collection, existing, "appending to existing documents");
        }

        Ok(())
    }

    async fn write_documents(
        &self,
        receiver: &mut mpsc::Receiver<Vec<Document>>,
        summary: &mut DocumentSummary,
    ) -> EtlResult<()> {
        while let Some(batch) = receiver.recv().await {
            let size = batch.len();
            let outcome = self.sink.insert_many(&self.collection, batch).await?;

            summary.documents_written += outcome.accepted;
            summary.documents_rejected += outcome.errors.len() as u64;
            if !outcome.errors.is_empty() {
                warn!(
                    collection = %self.collection,
                    rejected = outcome.errors.len(),
                    first_id = ?outcome.errors[0].id,
                    reason = %outcome.errors[0].reason,
                    "documents rejected by the sink"
                );
            }
            debug!(collection = %self.collection, size, accepted = outcome.accepted, "wrote document batch");
        }

        Ok(())
    }
}

struct Sources {
    companies: TableBatches,
    establishments: TableBatches,
    partners: Option<TableBatches>,
    simples: Option<TableBatches>,
}

#[derive(Default)]
struct AssemblyReport {
    tables: Vec<TableOutcome>,
    documents_assembled: u64,
    assembly_defects: u64,
    orphan_rows: u64,
    ungrouped_rows: u64,
    error: Option<EtlError>,
}

/// Child rows of one table, grouped with the configured join strategy.
enum ChildGroups {
    Missing,
    Hashed {
        table: GroupedTable,
        stats: ReadStats,
    },
    Merged(SortedGroupCursor<BlockingRows>),
}

impl ChildGroups {
    fn open(
        batches: Option<TableBatches>,
        join_strategy: JoinStrategy,
        key_column: usize,
    ) -> EtlResult<ChildGroups> {
        let Some(mut batches) = batches else {
            return Ok(ChildGroups::Missing);
        };

        match join_strategy {
            JoinStrategy::Hash => {
                let mut table = GroupedTable::new(key_column);
                while let Some(batch) = batches.blocking_next_batch()? {
                    table.extend(batch);
                }
                info!(
                    table = batches.table(),
                    keys = table.len(),
                    rows = table.rows(),
                    "grouped child table"
                );

                Ok(ChildGroups::Hashed {
                    table,
                    stats: batches.take_stats(),
                })
            }
            JoinStrategy::SortedMerge => Ok(ChildGroups::Merged(SortedGroupCursor::new(
                batches.into_rows(),
                key_column,
            ))),
        }
    }

    /// Reads whatever the parent pass left over and records the table's counters.
    fn finish(self, table: &str, report: &mut AssemblyReport) -> EtlResult<()> {
        let mut outcome = TableOutcome::new(table);
        match self {
            ChildGroups::Missing => return Ok(()),
            ChildGroups::Hashed { table, stats } => {
                report.ungrouped_rows += table.ungrouped_rows();
                outcome.record_read(stats);
            }
            ChildGroups::Merged(mut cursor) => {
                cursor.finish()?;
                report.orphan_rows += cursor.orphan_rows();
                report.ungrouped_rows += cursor.ungrouped_rows();
                let stats = cursor.into_inner().stats().cloned().unwrap_or_default();
                outcome.record_read(stats);
            }
        }

        outcome.phase = TablePhase::Done;
        report.tables.push(outcome);

        Ok(())
    }
}

impl GroupLookup for ChildGroups {
    fn group(&mut self, key: &GroupKey) -> EtlResult<Cow<'_, [SourceRow]>> {
        match self {
            ChildGroups::Missing => Ok(Cow::Borrowed(&[])),
            ChildGroups::Hashed { table, .. } => table.group(key),
            ChildGroups::Merged(cursor) => cursor.group(key),
        }
    }
}

fn assemble_documents(
    sources: Sources,
    join_strategy: JoinStrategy,
    assembler: &Assembler,
    batch_size: usize,
    sender: mpsc::Sender<Vec<Document>>,
) -> AssemblyReport {
    let mut report = AssemblyReport::default();
    if let Err(err) = assemble_all(sources, join_strategy, assembler, batch_size, &sender, &mut report) {
        report.error = Some(err);
    }

    report
}

fn assemble_all(
    sources: Sources,
    join_strategy: JoinStrategy,
    assembler: &Assembler,
    batch_size: usize,
    sender: &mpsc::Sender<Vec<Document>>,
    report: &mut AssemblyReport,
) -> EtlResult<()> {
    let Sources {
        mut companies,
        establishments,
        partners,
        simples: simples_rows,
    } = sources;

    let mut establishments = ChildGroups::open(
        Some(establishments),
        join_strategy,
        estabelecimentos::CNPJ_BASICO,
    )?;
    let mut partners = ChildGroups::open(partners, join_strategy, socios::CNPJ_BASICO)?;
    let mut simples_rows = ChildGroups::open(simples_rows, join_strategy, simples::CNPJ_BASICO)?;

    let mut documents = Vec::with_capacity(batch_size);
    while let Some(batch) = companies.blocking_next_batch()? {
        for company in batch {
            let Some(key) = company.key(empresas::CNPJ_BASICO) else {
                record_assembly_defect(report);
                continue;
            };

            let assembled = assembler.assemble(
                &company,
                &establishments.group(&key)?,
                &partners.group(&key)?,
                &simples_rows.group(&key)?,
            );
            let document = match assembled {
                Ok(document) => document.into_document()?,
                Err(err) if err.kind() == ErrorKind::MissingMandatoryField => {
                    record_assembly_defect(report);
                    continue;
                }
                Err(err) => return Err(err),
            };

            documents.push(document);
            if documents.len() >= batch_size {
                let full = std::mem::replace(&mut documents, Vec::with_capacity(batch_size));
                send_documents(full, sender, report)?;
            }
        }
    }

    if !documents.is_empty() {
        send_documents(documents, sender, report)?;
    }

    let mut outcome = TableOutcome::new(COMPANIES);
    outcome.record_read(companies.take_stats());
    outcome.phase = TablePhase::Done;
    report.tables.push(outcome);

    establishments.finish(ESTABLISHMENTS, report)?;
    partners.finish(PARTNERS, report)?;
    simples_rows.finish(SIMPLES, report)?;

    Ok(())
}

fn send_documents(
    documents: Vec<Document>,
    sender: &mpsc::Sender<Vec<Document>>,
    report: &mut AssemblyReport,
) -> EtlResult<()> {
    let size = documents.len() as u64;
    if sender.blocking_send(documents).is_err() {
        bail!(ErrorKind::InvalidState, "Document writer went away");
    }

    report.documents_assembled += size;
    counter!(CNPJ_DOCUMENTS_ASSEMBLED_TOTAL).increment(size);

    Ok(())
}

fn record_assembly_defect(report: &mut AssemblyReport) {
    report.assembly_defects += 1;
    counter!(
        CNPJ_DEFECTS_TOTAL,
        TABLE_NAME_LABEL => COMPANIES,
        DEFECT_LABEL => "missing_mandatory_field",
    )
    .increment(1);
}
