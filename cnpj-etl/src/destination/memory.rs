use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::info;

use crate::assembler::Document;
use crate::conversions::copy::decode_copy_payload;
use crate::destination::{
    CopyOutcome, DocumentRejection, DocumentSink, InsertManyOutcome, TableSink,
};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{IndexSchema, TableName, TableSchema};
use crate::{bail, etl_error};

type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, Table>,
    unique_columns: HashMap<String, String>,
    failing_tables: HashMap<String, ErrorKind>,
    copy_calls: HashMap<TableName, usize>,
    indexes: Vec<String>,
    prepared: bool,
    analyzed: bool,
}

/// In-memory relational sink for tests and dry runs.
///
/// Payloads are decoded back from the `COPY` text format, so what a test reads from
/// [`MemorySink::rows`] is what Postgres would have stored. A unique column can be declared
/// per table to exercise partial batch rejection, and copy failures can be injected.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with arbitrary columns and rows, bypassing schema declarations.
    pub async fn seed_table(&self, table: TableName, columns: &[&str], rows: Vec<Row>) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(
            table,
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
    }

    /// Rows whose value in `column` already exists in `table` are rejected one by one.
    pub async fn set_unique_column(&self, table: &str, column: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .unique_columns
            .insert(table.to_string(), column.to_string());
    }

    /// Makes every copy into `table` fail with `kind`.
    pub async fn fail_copies(&self, table: &str, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.failing_tables.insert(table.to_string(), kind);
    }

    pub async fn rows(&self, table: &TableName) -> Option<Vec<Row>> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).map(|table| table.rows.clone())
    }

    pub async fn columns(&self, table: &TableName) -> Option<Vec<String>> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).map(|table| table.columns.clone())
    }

    pub async fn copy_calls(&self, table: &TableName) -> usize {
        let inner = self.inner.lock().await;
        inner.copy_calls.get(table).copied().unwrap_or_default()
    }

    pub async fn indexes(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.indexes.clone()
    }

    pub async fn prepared(&self) -> bool {
        self.inner.lock().await.prepared
    }

    pub async fn analyzed(&self) -> bool {
        self.inner.lock().await.analyzed
    }
}

impl TableSink for MemorySink {
    fn name() -> &'static str {
        "memory"
    }

    async fn prepare(&self) -> EtlResult<()> {
        self.inner.lock().await.prepared = true;

        Ok(())
    }

    async fn describe_columns(&self, table: &TableName) -> EtlResult<Option<Vec<String>>> {
        Ok(self.columns(table).await)
    }

    async fn create_table(&self, schema: &TableSchema) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.tables.contains_key(&schema.name) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Table already exists",
                schema.name
            );
        }

        info!(table = %schema.name, "creating table");
        inner.tables.insert(
            schema.name.clone(),
            Table {
                columns: schema.column_names().map(str::to_string).collect(),
                rows: Vec::new(),
            },
        );

        Ok(())
    }

    async fn drop_table(&self, table: &TableName) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        info!(%table, "dropping table");
        inner.tables.remove(table);
        let prefix = format!("{}:", table);
        inner.indexes.retain(|index| !index.starts_with(&prefix));

        Ok(())
    }

    async fn count_rows(&self, table: &TableName) -> EtlResult<u64> {
        let inner = self.inner.lock().await;
        match inner.tables.get(table) {
            Some(table) => Ok(table.rows.len() as u64),
            None => Err(etl_error!(
                ErrorKind::DestinationQueryFailed,
                "Table does not exist",
                table
            )),
        }
    }

    async fn truncate_table(&self, table: &TableName) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Table does not exist",
                table
            );
        };

        info!(%table, rows = stored.rows.len(), "truncating table");
        stored.rows.clear();

        Ok(())
    }

    async fn copy_rows(
        &self,
        schema: &TableSchema,
        payload: Bytes,
        rows: usize,
    ) -> EtlResult<CopyOutcome> {
        let mut inner = self.inner.lock().await;
        *inner.copy_calls.entry(schema.name.clone()).or_default() += 1;

        if let Some(kind) = inner.failing_tables.get(&schema.name.name) {
            bail!(*kind, "Injected copy failure", schema.name);
        }

        let decoded = decode_copy_payload(&payload)?;
        if decoded.len() != rows {
            bail!(
                ErrorKind::ConversionError,
                "Copy payload row count differs from the batch",
                format!("{} decoded, {rows} expected", decoded.len())
            );
        }

        let unique_column = inner.unique_columns.get(&schema.name.name).cloned();
        let Some(table) = inner.tables.get_mut(&schema.name) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Table does not exist",
                schema.name
            );
        };

        if let Some(row) = decoded.iter().find(|row| row.len() != table.columns.len()) {
            bail!(
                ErrorKind::ConversionError,
                "Copy row width differs from the table",
                format!("{} values, {} columns", row.len(), table.columns.len())
            );
        }

        let unique_position =
            unique_column.and_then(|column| table.columns.iter().position(|c| *c == column));
        let Some(position) = unique_position else {
            let accepted = decoded.len() as u64;
            table.rows.extend(decoded);
            return Ok(CopyOutcome {
                accepted,
                rejected: 0,
            });
        };

        let mut seen: HashSet<Option<String>> = table
            .rows
            .iter()
            .map(|row| row[position].clone())
            .collect();
        let mut outcome = CopyOutcome::default();
        for row in decoded {
            if seen.insert(row[position].clone()) {
                table.rows.push(row);
                outcome.accepted += 1;
            } else {
                outcome.rejected += 1;
            }
        }

        Ok(outcome)
    }

    async fn create_index(&self, index: &IndexSchema) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.tables.contains_key(&index.table) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Cannot index a missing table",
                index.table
            );
        }

        let entry = format!("{}:{}", index.table, index.name);
        if !inner.indexes.contains(&entry) {
            inner.indexes.push(entry);
        }

        Ok(())
    }

    async fn analyze(&self) -> EtlResult<()> {
        self.inner.lock().await.analyzed = true;

        Ok(())
    }
}

#[derive(Debug, Default)]
struct DocumentsInner {
    collections: HashMap<String, Vec<Document>>,
    indexes: Vec<(String, String)>,
    flushes: usize,
}

/// In-memory document sink enforcing unique `_id`s per collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSink {
    inner: Arc<Mutex<DocumentsInner>>,
}

impl MemoryDocumentSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let inner = self.inner.lock().await;
        inner
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn indexes(&self) -> Vec<(String, String)> {
        self.inner.lock().await.indexes.clone()
    }

    pub async fn flushes(&self) -> usize {
        self.inner.lock().await.flushes
    }
}

impl DocumentSink for MemoryDocumentSink {
    fn name() -> &'static str {
        "memory"
    }

    async fn count_documents(&self, collection: &str) -> EtlResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .collections
            .get(collection)
            .map(|documents| documents.len() as u64)
            .unwrap_or_default())
    }

    async fn clear_collection(&self, collection: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.collections.remove(collection);

        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> EtlResult<InsertManyOutcome> {
        let mut inner = self.inner.lock().await;
        let stored = inner.collections.entry(collection.to_string()).or_default();

        let mut ids: HashSet<String> = stored
            .iter()
            .filter_map(|document| document_id(document))
            .collect();
        let mut outcome = InsertManyOutcome::default();
        for (index, document) in documents.into_iter().enumerate() {
            let id = document_id(&document);
            if let Some(id) = &id {
                if !ids.insert(id.clone()) {
                    outcome.errors.push(DocumentRejection {
                        index,
                        id: Some(id.clone()),
                        reason: "duplicate key _id".to_string(),
                    });
                    continue;
                }
            }

            stored.push(document);
            outcome.accepted += 1;
        }

        Ok(outcome)
    }

    async fn create_index(&self, collection: &str, field: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let entry = (collection.to_string(), field.to_string());
        if !inner.indexes.contains(&entry) {
            inner.indexes.push(entry);
        }

        Ok(())
    }

    async fn flush(&self) -> EtlResult<()> {
        self.inner.lock().await.flushes += 1;

        Ok(())
    }
}

pub(crate) fn document_id(document: &Document) -> Option<String> {
    document
        .get("_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use serde_json::json;

    use super::*;
    use crate::conversions::copy::encode_copy_row;
    use crate::types::ColumnSchema;

    fn schema() -> TableSchema {
        TableSchema::new(
            TableName::new("public", "paises"),
            vec![
                ColumnSchema::new("codigo", "VARCHAR(10)"),
                ColumnSchema::new("nome", "VARCHAR(255)"),
            ],
        )
    }

    fn payload(rows: &[[Option<&str>; 2]]) -> Bytes {
        let mut out = BytesMut::new();
        for row in rows {
            let values: Vec<_> = row.iter().map(|v| v.map(str::to_string)).collect();
            encode_copy_row(&values, &mut out);
        }
        out.freeze()
    }

    #[tokio::test]
    async fn copied_rows_are_decoded_back() {
        let sink = MemorySink::new();
        sink.create_table(&schema()).await.unwrap();

        let outcome = sink
            .copy_rows(&schema(), payload(&[[Some("105"), Some("BRASIL")], [Some("999"), None]]), 2)
            .await
            .unwrap();

        assert_eq!(outcome, CopyOutcome { accepted: 2, rejected: 0 });
        let rows = sink.rows(&schema().name).await.unwrap();
        assert_eq!(rows[1], vec![Some("999".to_string()), None]);
        assert_eq!(sink.copy_calls(&schema().name).await, 1);
    }

    #[tokio::test]
    async fn unique_column_rejects_duplicates_individually() {
        let sink = MemorySink::new();
        sink.create_table(&schema()).await.unwrap();
        sink.set_unique_column("paises", "codigo").await;

        let outcome = sink
            .copy_rows(
                &schema(),
                payload(&[[Some("105"), Some("BRASIL")], [Some("105"), Some("BRAZIL")], [Some("249"), Some("EUA")]]),
                3,
            )
            .await
            .unwrap();

        assert_eq!(outcome, CopyOutcome { accepted: 2, rejected: 1 });
    }

    #[tokio::test]
    async fn copy_into_missing_table_fails() {
        let sink = MemorySink::new();

        let err = sink
            .copy_rows(&schema(), payload(&[[Some("105"), None]]), 1)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    }

    #[tokio::test]
    async fn duplicate_document_ids_are_rejected_without_stopping_the_batch() {
        let sink = MemoryDocumentSink::new();
        let document = |id: &str| json!({"_id": id}).as_object().unwrap().clone();

        let outcome = sink
            .insert_many("empresas", vec![document("1"), document("1"), document("2")])
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 2);
        assert_eq!(
            outcome.errors,
            vec![DocumentRejection {
                index: 1,
                id: Some("1".to_string()),
                reason: "duplicate key _id".to_string(),
            }]
        );
        assert_eq!(sink.count_documents("empresas").await.unwrap(), 2);
    }
}
