use bytes::Bytes;
use std::future::Future;

use crate::assembler::Document;
use crate::error::EtlResult;
use crate::types::{IndexSchema, TableName, TableSchema};

/// Rows accepted and rejected by one bulk transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    pub accepted: u64,
    pub rejected: u64,
}

/// Trait for relational stores that bulk load normalized tables.
///
/// [`TableSink`] implementations own the DDL needed to reconcile a destination table with
/// its declared [`TableSchema`] and accept rows as Postgres `COPY` text payloads whose column
/// order is the schema's column order.
///
/// A payload is transferred atomically or rejected as a whole, unless the implementation can
/// report per-row rejections through [`CopyOutcome::rejected`]. Data and constraint problems
/// must be reported with a batch scoped [`crate::error::ErrorKind`] so the caller can record
/// them and continue; any other error aborts the table.
pub trait TableSink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Prepares the store before any table is loaded, e.g. by installing extensions.
    ///
    /// The default implementation is a no-op.
    fn prepare(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }

    /// Returns the live column names of `table` in ordinal order, or `None` when the table
    /// does not exist.
    fn describe_columns(
        &self,
        table: &TableName,
    ) -> impl Future<Output = EtlResult<Option<Vec<String>>>> + Send;

    fn create_table(&self, schema: &TableSchema) -> impl Future<Output = EtlResult<()>> + Send;

    /// Drops `table` and everything depending on it. Missing tables are not an error.
    fn drop_table(&self, table: &TableName) -> impl Future<Output = EtlResult<()>> + Send;

    fn count_rows(&self, table: &TableName) -> impl Future<Output = EtlResult<u64>> + Send;

    fn truncate_table(&self, table: &TableName) -> impl Future<Output = EtlResult<()>> + Send;

    /// Transfers one encoded batch of `rows` rows into `schema`'s table.
    fn copy_rows(
        &self,
        schema: &TableSchema,
        payload: Bytes,
        rows: usize,
    ) -> impl Future<Output = EtlResult<CopyOutcome>> + Send;

    /// Creates `index` unless an index with the same name exists.
    fn create_index(&self, index: &IndexSchema) -> impl Future<Output = EtlResult<()>> + Send;

    /// Refreshes planner statistics after loading.
    ///
    /// The default implementation is a no-op.
    fn analyze(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }
}

/// A document the sink refused, identified by its position in the inserted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRejection {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// Result of [`DocumentSink::insert_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyOutcome {
    pub accepted: u64,
    pub errors: Vec<DocumentRejection>,
}

/// Trait for document stores receiving assembled company documents.
///
/// Inserts are unordered: a rejected document, typically a duplicate `_id`, does not stop
/// the remaining documents of the batch.
pub trait DocumentSink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    fn count_documents(&self, collection: &str) -> impl Future<Output = EtlResult<u64>> + Send;

    fn clear_collection(&self, collection: &str) -> impl Future<Output = EtlResult<()>> + Send;

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl Future<Output = EtlResult<InsertManyOutcome>> + Send;

    /// Requests an index on `field`. Sinks without indexes may ignore it.
    fn create_index(
        &self,
        collection: &str,
        field: &str,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Makes every accepted document durable.
    fn flush(&self) -> impl Future<Output = EtlResult<()>> + Send;
}
