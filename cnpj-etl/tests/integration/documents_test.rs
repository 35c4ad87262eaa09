use std::path::Path;
use std::sync::Arc;

use cnpj_config::shared::{DestinationConfig, JoinStrategy};
use cnpj_etl::destination::json_lines::{DuplicateCheck, JsonLinesSink};
use cnpj_etl::destination::DocumentSink;
use cnpj_etl::destination::memory::MemoryDocumentSink;
use cnpj_etl::error::ErrorKind;
use cnpj_etl::pipeline::{DocumentPipeline, DocumentSummary};
use cnpj_etl::test_utils::config::{json_lines_destination, loader_config};
use cnpj_etl::test_utils::fixtures::{
    establishment_row, registry_lines, registry_lines_owned, write_zip,
};
use cnpj_telemetry::tracing::init_test_tracing;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::support::{write_lookups, write_sample_registry};

const BATCH_SIZE: usize = 10;

async fn run_json_lines(source: &Path, output: &Path, join_strategy: JoinStrategy) -> DocumentSummary {
    let destination = json_lines_destination(output, join_strategy);
    let config = loader_config(source, Vec::new(), BATCH_SIZE, destination);
    let sink = JsonLinesSink::new(output, DuplicateCheck::LastId).await.unwrap();
    let pipeline =
        DocumentPipeline::new(Arc::new(config), sink, "empresas", join_strategy, true).unwrap();

    pipeline.run().await
}

async fn run_memory(source: &Path, sink: &MemoryDocumentSink, clear_existing: bool) -> DocumentSummary {
    let config = loader_config(source, Vec::new(), BATCH_SIZE, DestinationConfig::Memory);
    let pipeline = DocumentPipeline::new(
        Arc::new(config),
        sink.clone(),
        "empresas",
        JoinStrategy::Hash,
        clear_existing,
    )
    .unwrap();

    pipeline.run().await
}

fn read_documents(output: &Path) -> Vec<Value> {
    let content = std::fs::read_to_string(output.join("empresas.jsonl")).unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn companies_are_written_with_their_children_nested() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sample_registry(source.path());

    let summary = run_json_lines(source.path(), output.path(), JoinStrategy::Hash).await;

    assert!(summary.is_success(), "{:?}", summary.error);
    assert_eq!(summary.documents_assembled, 2);
    assert_eq!(summary.documents_written, 2);
    assert_eq!(summary.live_documents, Some(2));
    assert!(summary.missing_lookups.is_empty());

    let documents = read_documents(output.path());
    assert_eq!(documents.len(), 2);

    let acme = &documents[0];
    assert_eq!(acme["_id"], "12345678");
    assert_eq!(
        acme["natureza_juridica"],
        json!({"codigo": "2062", "descricao": "Sociedade Empresária Limitada"})
    );
    assert_eq!(acme["capital_social"], json!(1234.56));

    let cnpjs: Vec<&str> = acme["estabelecimentos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|establishment| establishment["cnpj"].as_str().unwrap())
        .collect();
    assert_eq!(cnpjs, vec!["12345678000310", "12345678000130", "12345678000220"]);

    let headquarters = &acme["estabelecimentos"][0];
    assert_eq!(headquarters["matriz"], true);
    assert_eq!(headquarters["contato"]["email"], "contato@acme.com.br");
    assert_eq!(headquarters["contato"]["telefone1"], "(11) 30001000");
    assert_eq!(
        headquarters["cnae_principal"]["descricao"],
        "Desenvolvimento de programas"
    );

    assert_eq!(acme["socios"].as_array().unwrap().len(), 1);
    assert_eq!(acme["socios"][0]["representante_legal"], Value::Null);
    // The last Simples row of a company wins.
    assert_eq!(acme["simples"]["optante_simples"], false);
    assert_eq!(acme["simples"]["data_exclusao_simples"], "2011-12-31");

    let without_children = &documents[1];
    assert_eq!(without_children["_id"], "87654321");
    assert_eq!(without_children["estabelecimentos"], json!([]));
    assert_eq!(without_children["socios"], json!([]));
    assert_eq!(without_children["simples"], Value::Null);
}

#[tokio::test(flavor = "multi_thread")]
async fn sorted_merge_produces_the_same_documents_as_hash_join() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    let hashed = TempDir::new().unwrap();
    let merged = TempDir::new().unwrap();
    write_sample_registry(source.path());

    run_json_lines(source.path(), hashed.path(), JoinStrategy::Hash).await;
    let summary = run_json_lines(source.path(), merged.path(), JoinStrategy::SortedMerge).await;

    assert!(summary.is_success(), "{:?}", summary.error);
    assert_eq!(summary.orphan_rows, 0);
    assert_eq!(
        std::fs::read(hashed.path().join("empresas.jsonl")).unwrap(),
        std::fs::read(merged.path().join("empresas.jsonl")).unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn optional_tables_may_be_missing() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_lookups(source.path());
    write_zip(
        source.path(),
        "Empresas.zip",
        &registry_lines([["11111111", "PADARIA", "2062", "49", "10,00", "01", ""]]),
    );
    write_zip(
        source.path(),
        "Estabelecimentos.zip",
        &registry_lines_owned(&[establishment_row("11111111", "0001", "99", true)]),
    );

    let summary = run_json_lines(source.path(), output.path(), JoinStrategy::Hash).await;

    assert!(summary.is_success(), "{:?}", summary.error);
    // Only the parent and the required child table were read.
    assert_eq!(summary.tables.len(), 2);
    let documents = read_documents(output.path());
    assert_eq!(documents[0]["socios"], json!([]));
    assert_eq!(documents[0]["simples"], Value::Null);
    assert_eq!(documents[0]["estabelecimentos"][0]["cnpj_formatado"], "11.111.111/0001-99");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_establishments_fail_the_run_before_writing() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_lookups(source.path());
    write_zip(
        source.path(),
        "Empresas.zip",
        &registry_lines([["11111111", "PADARIA", "2062", "49", "10,00", "01", ""]]),
    );

    let summary = run_json_lines(source.path(), output.path(), JoinStrategy::Hash).await;

    assert!(!summary.is_success());
    assert_eq!(summary.error.as_ref().unwrap().kind(), ErrorKind::MissingSource);
    assert_eq!(summary.documents_written, 0);
    assert!(!output.path().join("empresas.jsonl").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_rejects_duplicates_unless_the_collection_is_cleared() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    write_sample_registry(source.path());
    let sink = MemoryDocumentSink::new();

    let first = run_memory(source.path(), &sink, true).await;
    assert_eq!(first.documents_written, 2);

    let appended = run_memory(source.path(), &sink, false).await;
    assert!(appended.is_success());
    assert_eq!(appended.documents_written, 0);
    assert_eq!(appended.documents_rejected, 2);
    assert_eq!(appended.live_documents, Some(2));

    let cleared = run_memory(source.path(), &sink, true).await;
    assert_eq!(cleared.documents_written, 2);
    assert_eq!(cleared.documents_rejected, 0);
    assert_eq!(sink.count_documents("empresas").await.unwrap(), 2);
    assert!(
        sink.indexes()
            .await
            .contains(&("empresas".to_string(), "_id".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn companies_without_a_key_are_counted_as_defects() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    write_sample_registry(source.path());
    write_zip(
        source.path(),
        "Empresas1.zip",
        &registry_lines([["", "SEM CNPJ", "2062", "49", "1,00", "01", ""]]),
    );
    let sink = MemoryDocumentSink::new();

    let summary = run_memory(source.path(), &sink, true).await;

    assert!(summary.is_success());
    assert_eq!(summary.assembly_defects, 1);
    assert_eq!(summary.documents_written, 2);
    assert_eq!(summary.tables[0].rows_read, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_lookups_only_disable_enrichment() {
    init_test_tracing();
    let source = TempDir::new().unwrap();
    write_sample_registry(source.path());
    std::fs::remove_file(source.path().join("Naturezas.zip")).unwrap();
    let sink = MemoryDocumentSink::new();

    let summary = run_memory(source.path(), &sink, true).await;

    assert!(summary.is_success());
    assert_eq!(summary.missing_lookups, vec!["naturezas".to_string()]);
    let documents = sink.documents("empresas").await;
    assert_eq!(
        documents[0]["natureza_juridica"],
        json!({"codigo": "2062", "descricao": null})
    );
}
