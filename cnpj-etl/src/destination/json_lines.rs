use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info};

use cnpj_config::shared::JsonLinesConfig;

use crate::assembler::Document;
use crate::destination::memory::document_id;
use crate::destination::{DocumentRejection, DocumentSink, InsertManyOutcome};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// How a [`JsonLinesSink`] finds documents whose `_id` was already written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// Compares each `_id` with the last one written. Complete for key ordered streams.
    LastId,
    /// Keeps every written `_id` in memory.
    AllIds,
}

impl DuplicateCheck {
    pub fn from_config(config: &JsonLinesConfig) -> DuplicateCheck {
        if config.track_all_ids {
            DuplicateCheck::AllIds
        } else {
            DuplicateCheck::LastId
        }
    }
}

#[derive(Default)]
struct WrittenIds {
    last: Option<String>,
    all: HashSet<String>,
}

impl WrittenIds {
    /// Records `id` and returns whether it was already written.
    fn is_duplicate(&mut self, check: DuplicateCheck, id: String) -> bool {
        match check {
            DuplicateCheck::LastId => {
                if self.last.as_deref() == Some(id.as_str()) {
                    return true;
                }
                self.last = Some(id);
            }
            DuplicateCheck::AllIds => {
                if !self.all.insert(id) {
                    return true;
                }
            }
        }

        false
    }
}

struct CollectionFile {
    writer: BufWriter<File>,
    documents: u64,
    ids: WrittenIds,
}

/// Writes each collection to `<output_dir>/<collection>.jsonl`, one document per line.
///
/// Documents already present when the file is opened are counted but their ids are not
/// tracked, so duplicate detection covers the documents written by this sink.
#[derive(Clone)]
pub struct JsonLinesSink {
    output_dir: PathBuf,
    duplicates: DuplicateCheck,
    files: Arc<Mutex<HashMap<String, CollectionFile>>>,
}

impl JsonLinesSink {
    pub async fn new(
        output_dir: impl Into<PathBuf>,
        duplicates: DuplicateCheck,
    ) -> EtlResult<JsonLinesSink> {
        let output_dir = output_dir.into();
        tokio::fs::create_dir_all(&output_dir).await.map_err(|err| {
            etl_error!(
                ErrorKind::DestinationIoError,
                "Could not create the output directory",
                output_dir.display(),
                source: err
            )
        })?;

        Ok(JsonLinesSink {
            output_dir,
            duplicates,
            files: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.output_dir.join(format!("{collection}.jsonl"))
    }

    async fn open(path: &Path, truncate: bool) -> EtlResult<CollectionFile> {
        let documents = if truncate { 0 } else { count_lines(path).await? };

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let file = options.open(path).await.map_err(|err| {
            etl_error!(
                ErrorKind::DestinationIoError,
                "Could not open the output file",
                path.display(),
                source: err
            )
        })?;

        Ok(CollectionFile {
            writer: BufWriter::new(file),
            documents,
            ids: WrittenIds::default(),
        })
    }
}

async fn count_lines(path: &Path) -> EtlResult<u64> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };

    let mut lines = BufReader::new(file).lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            count += 1;
        }
    }

    Ok(count)
}

impl DocumentSink for JsonLinesSink {
    fn name() -> &'static str {
        "json_lines"
    }

    async fn count_documents(&self, collection: &str) -> EtlResult<u64> {
        let files = self.files.lock().await;
        match files.get(collection) {
            Some(file) => Ok(file.documents),
            None => count_lines(&self.collection_path(collection)).await,
        }
    }

    async fn clear_collection(&self, collection: &str) -> EtlResult<()> {
        let path = self.collection_path(collection);
        let file = Self::open(&path, true).await?;

        info!(path = %path.display(), "cleared collection file");
        self.files.lock().await.insert(collection.to_string(), file);

        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> EtlResult<InsertManyOutcome> {
        let mut files = self.files.lock().await;
        if !files.contains_key(collection) {
            let file = Self::open(&self.collection_path(collection), false).await?;
            files.insert(collection.to_string(), file);
        }
        let Some(file) = files.get_mut(collection) else {
            return Err(etl_error!(
                ErrorKind::InvalidState,
                "Collection file is not open",
                collection
            ));
        };

        let mut outcome = InsertManyOutcome::default();
        let mut buffer = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if let Some(id) = document_id(document) {
                if file.ids.is_duplicate(self.duplicates, id.clone()) {
                    outcome.errors.push(DocumentRejection {
                        index,
                        id: Some(id),
                        reason: "duplicate key _id".to_string(),
                    });
                    continue;
                }
            }

            serde_json::to_writer(&mut buffer, document)?;
            buffer.push(b'\n');
            outcome.accepted += 1;
        }

        file.writer.write_all(&buffer).await?;
        file.documents += outcome.accepted;

        Ok(outcome)
    }

    async fn create_index(&self, collection: &str, field: &str) -> EtlResult<()> {
        debug!(collection, field, "json lines files have no indexes, skipping");

        Ok(())
    }

    async fn flush(&self) -> EtlResult<()> {
        let mut files = self.files.lock().await;
        for file in files.values_mut() {
            file.writer.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn writes_one_unescaped_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path(), DuplicateCheck::AllIds).await.unwrap();

        sink.clear_collection("empresas").await.unwrap();
        let outcome = sink
            .insert_many(
                "empresas",
                vec![
                    document(json!({"_id": "00000001", "razao_social": "AÇÚCAR LTDA"})),
                    document(json!({"_id": "00000002", "razao_social": null})),
                ],
            )
            .await
            .unwrap();
        sink.flush().await.unwrap();

        assert_eq!(outcome.accepted, 2);
        let written = std::fs::read_to_string(sink.collection_path("empresas")).unwrap();
        assert_eq!(
            written,
            "{\"_id\":\"00000001\",\"razao_social\":\"AÇÚCAR LTDA\"}\n{\"_id\":\"00000002\",\"razao_social\":null}\n"
        );
        assert_eq!(sink.count_documents("empresas").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn tracked_ids_reject_duplicates_anywhere() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path(), DuplicateCheck::AllIds).await.unwrap();

        let outcome = sink
            .insert_many(
                "empresas",
                vec![
                    document(json!({"_id": "1"})),
                    document(json!({"_id": "2"})),
                    document(json!({"_id": "1"})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 2);
    }

    #[tokio::test]
    async fn ordered_writes_reject_repeats_without_keeping_every_id() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path(), DuplicateCheck::LastId)
            .await
            .unwrap();

        sink.insert_many(
            "empresas",
            vec![document(json!({"_id": "1"})), document(json!({"_id": "2"}))],
        )
        .await
        .unwrap();
        // The repeat spans two calls, like consecutive batches of a sorted merge.
        let outcome = sink
            .insert_many(
                "empresas",
                vec![document(json!({"_id": "2"})), document(json!({"_id": "3"}))],
            )
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].id.as_deref(), Some("2"));
        let files = sink.files.lock().await;
        let ids = &files["empresas"].ids;
        assert!(ids.all.is_empty());
        assert_eq!(ids.last.as_deref(), Some("3"));
    }

    #[test]
    fn duplicate_check_follows_the_config() {
        let mut config = JsonLinesConfig {
            output_dir: "out".into(),
            collection: "empresas".to_string(),
            join_strategy: Default::default(),
            track_all_ids: false,
        };
        assert_eq!(DuplicateCheck::from_config(&config), DuplicateCheck::LastId);

        config.track_all_ids = true;
        assert_eq!(DuplicateCheck::from_config(&config), DuplicateCheck::AllIds);
    }

    #[tokio::test]
    async fn reopened_files_append_and_count_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empresas.jsonl"), "{\"_id\":\"1\"}\n").unwrap();
        let sink = JsonLinesSink::new(dir.path(), DuplicateCheck::AllIds).await.unwrap();

        assert_eq!(sink.count_documents("empresas").await.unwrap(), 1);
        sink.insert_many("empresas", vec![document(json!({"_id": "2"}))])
            .await
            .unwrap();
        sink.flush().await.unwrap();

        assert_eq!(sink.count_documents("empresas").await.unwrap(), 2);
        sink.clear_collection("empresas").await.unwrap();
        assert_eq!(sink.count_documents("empresas").await.unwrap(), 0);
    }
}
