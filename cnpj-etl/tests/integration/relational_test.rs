use std::sync::Arc;

use cnpj_config::shared::{DestinationConfig, TableConfig};
use cnpj_etl::destination::TableSink;
use cnpj_etl::destination::memory::MemorySink;
use cnpj_etl::error::ErrorKind;
use cnpj_etl::loader::{ResolvedPolicy, TruncateOutcome};
use cnpj_etl::pipeline::{FailedPhase, RelationalPipeline, RunSummary, TablePhase};
use cnpj_etl::test_utils::config::{companies_table, loader_config, lookup_table, text_table};
use cnpj_etl::test_utils::fixtures::{registry_lines_owned, write_plain, write_zip, write_zip_entries};
use cnpj_etl::types::TableName;
use cnpj_telemetry::tracing::init_test_tracing;
use tempfile::TempDir;

const BATCH_SIZE: usize = 10;

fn countries(range: std::ops::Range<usize>) -> Vec<u8> {
    let rows: Vec<Vec<String>> = range
        .map(|code| vec![format!("{code:03}"), format!("PAIS {code}")])
        .collect();
    registry_lines_owned(&rows)
}

fn table_name(name: &str) -> TableName {
    TableName::new("public", name)
}

async fn run(
    dir: &TempDir,
    tables: Vec<TableConfig>,
    sink: &MemorySink,
    policy: ResolvedPolicy,
) -> RunSummary {
    let config = loader_config(dir.path(), tables, BATCH_SIZE, DestinationConfig::Memory);
    let pipeline = RelationalPipeline::new(Arc::new(config), "public", sink.clone(), policy).unwrap();

    pipeline.run().await
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_are_copied_in_full_batches_spanning_files() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises0.zip", &countries(0..12));
    write_zip(dir.path(), "Paises1.zip", &countries(12..25));
    let sink = MemorySink::new();

    let summary = run(&dir, vec![lookup_table("paises", "nome")], &sink, ResolvedPolicy::default()).await;

    assert!(summary.is_success());
    let outcome = summary.table("paises").unwrap();
    assert_eq!(outcome.phase, TablePhase::Done);
    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.rows_read, 25);
    assert_eq!(outcome.rows_loaded, 25);
    assert_eq!(outcome.live_rows, Some(25));
    assert_eq!(sink.copy_calls(&table_name("paises")).await, 3);

    let rows = sink.rows(&table_name("paises")).await.unwrap();
    assert_eq!(rows[0], vec![Some("000".to_string()), Some("PAIS 0".to_string())]);
    assert_eq!(rows[24][0].as_deref(), Some("024"));
}

#[tokio::test(flavor = "multi_thread")]
async fn indexes_are_created_after_loading_and_statistics_refreshed() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(
        dir.path(),
        "Empresas0.zip",
        &registry_lines_owned(&[vec![
            "12345678".into(),
            "ACME LTDA".into(),
            "2062".into(),
            "49".into(),
            "1000,00".into(),
            "01".into(),
            "".into(),
        ]]),
    );
    let sink = MemorySink::new();

    let summary = run(&dir, vec![companies_table()], &sink, ResolvedPolicy::default()).await;

    assert!(summary.is_success());
    assert_eq!(summary.indexes_created, 3);
    let indexes = sink.indexes().await;
    assert!(indexes.contains(&"public.empresas:idx_empresas_cnpj_basico".to_string()));
    assert!(indexes.contains(&"public.empresas:idx_empresas_razao_social_trgm".to_string()));
    assert!(indexes.contains(&"public.empresas:idx_empresas_natureza_porte".to_string()));
    assert!(sink.prepared().await);
    assert!(sink.analyzed().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_table_failing_while_loading_is_still_indexed_and_counted() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(
        dir.path(),
        "Empresas0.zip",
        &registry_lines_owned(&[vec![
            "12345678".into(),
            "ACME LTDA".into(),
            "2062".into(),
            "49".into(),
            "1000,00".into(),
            "01".into(),
            "".into(),
        ]]),
    );
    let sink = MemorySink::new();
    sink.fail_copies("empresas", ErrorKind::DestinationQueryFailed).await;

    let summary = run(&dir, vec![companies_table()], &sink, ResolvedPolicy::default()).await;

    assert!(!summary.is_success());
    let outcome = summary.table("empresas").unwrap();
    assert_eq!(
        outcome.phase,
        TablePhase::Failed {
            during: FailedPhase::Loading
        }
    );
    assert_eq!(outcome.live_rows, Some(0));
    assert_eq!(summary.indexes_created, 3);
    assert!(
        sink.indexes()
            .await
            .contains(&"public.empresas:idx_empresas_cnpj_basico".to_string())
    );
    assert!(sink.analyzed().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_table_without_sources_fails_and_later_tables_still_load() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises.zip", &countries(0..3));
    let sink = MemorySink::new();

    let summary = run(
        &dir,
        vec![lookup_table("motivos", "descricao"), lookup_table("paises", "nome")],
        &sink,
        ResolvedPolicy::default(),
    )
    .await;

    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.total_count(), 2);
    let motivos = summary.table("motivos").unwrap();
    assert_eq!(
        motivos.phase,
        TablePhase::Failed {
            during: FailedPhase::Discovery
        }
    );
    assert_eq!(motivos.error.as_ref().unwrap().kind(), ErrorKind::MissingSource);
    // Nothing is created or indexed for a table without sources.
    assert!(sink.columns(&table_name("motivos")).await.is_none());
    assert!(summary.table("motivos").unwrap().live_rows.is_none());
    assert_eq!(summary.table("paises").unwrap().rows_loaded, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_table_is_recreated_under_force() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises.zip", &countries(0..2));
    let sink = MemorySink::new();
    sink.seed_table(
        table_name("paises"),
        &["codigo", "nome", "sigla"],
        vec![vec![Some("999".into()), Some("OLD".into()), Some("XX".into())]],
    )
    .await;

    let summary = run(&dir, vec![lookup_table("paises", "nome")], &sink, ResolvedPolicy::default()).await;

    assert!(summary.is_success());
    assert_eq!(
        sink.columns(&table_name("paises")).await.unwrap(),
        vec!["codigo", "nome"]
    );
    assert_eq!(sink.rows(&table_name("paises")).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_table_is_left_untouched_without_force() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises.zip", &countries(0..2));
    let sink = MemorySink::new();
    sink.seed_table(
        table_name("paises"),
        &["codigo", "nome", "sigla"],
        vec![vec![Some("999".into()), Some("OLD".into()), Some("XX".into())]],
    )
    .await;
    let policy = ResolvedPolicy {
        recreate_on_mismatch: false,
        truncate_existing: true,
    };

    let summary = run(&dir, vec![lookup_table("paises", "nome")], &sink, policy).await;

    assert!(!summary.is_success());
    let outcome = summary.table("paises").unwrap();
    assert_eq!(
        outcome.phase,
        TablePhase::Failed {
            during: FailedPhase::Schema
        }
    );
    assert_eq!(outcome.error.as_ref().unwrap().kind(), ErrorKind::SchemaMismatch);
    assert_eq!(sink.rows(&table_name("paises")).await.unwrap().len(), 1);
    assert_eq!(sink.copy_calls(&table_name("paises")).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn reruns_truncate_or_append_per_policy() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises.zip", &countries(0..4));
    let sink = MemorySink::new();
    let tables = || vec![lookup_table("paises", "nome")];

    run(&dir, tables(), &sink, ResolvedPolicy::default()).await;
    let truncated = run(&dir, tables(), &sink, ResolvedPolicy::default()).await;
    assert_eq!(
        truncated.table("paises").unwrap().truncate,
        Some(TruncateOutcome::Truncated { removed: 4 })
    );
    assert_eq!(truncated.table("paises").unwrap().live_rows, Some(4));

    let appending = run(
        &dir,
        tables(),
        &sink,
        ResolvedPolicy {
            recreate_on_mismatch: true,
            truncate_existing: false,
        },
    )
    .await;
    assert_eq!(
        appending.table("paises").unwrap().truncate,
        Some(TruncateOutcome::Appending { existing: 4 })
    );
    assert_eq!(appending.table("paises").unwrap().live_rows, Some(8));
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_archives_and_malformed_rows_are_counted_and_skipped() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises0.zip", &countries(0..3));
    write_zip_entries(
        dir.path(),
        "Paises1.zip",
        &[("A.CSV", b"\"1\";\"A\"\n".as_slice()), ("B.CSV", b"\"2\";\"B\"\n".as_slice())],
    );
    write_plain(
        dir.path(),
        "Paises2.csv",
        b"\"500\";\"OK\"\n\"501\";\"TOO\";\"MANY\"\n\"502\"\n",
    );
    let sink = MemorySink::new();

    let summary = run(&dir, vec![lookup_table("paises", "nome")], &sink, ResolvedPolicy::default()).await;

    let outcome = summary.table("paises").unwrap();
    assert_eq!(outcome.phase, TablePhase::Done);
    assert_eq!(outcome.skipped_files.len(), 1);
    assert_eq!(outcome.skipped_files[0].error.kind(), ErrorKind::ArchiveFormat);
    assert_eq!(outcome.row_defects, 1);
    assert_eq!(outcome.rows_loaded, 5);

    // A short row is padded with nulls.
    let rows = sink.rows(&table_name("paises")).await.unwrap();
    assert_eq!(rows[4], vec![Some("502".to_string()), None]);
}

#[tokio::test(flavor = "multi_thread")]
async fn awkward_values_survive_the_whole_load() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    let awkward = "RUA A\tBLOCO 2\nFUNDOS \\ LOJA";
    write_zip(
        dir.path(),
        "Enderecos.zip",
        &registry_lines_owned(&[vec!["1".into(), awkward.into(), "".into()]]),
    );
    let sink = MemorySink::new();

    let summary = run(
        &dir,
        vec![text_table("enderecos", &["id", "logradouro", "complemento"])],
        &sink,
        ResolvedPolicy::default(),
    )
    .await;

    assert!(summary.is_success());
    let rows = sink.rows(&table_name("enderecos")).await.unwrap();
    assert_eq!(rows[0][1].as_deref(), Some(awkward));
    assert_eq!(rows[0][2], None);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_batches_are_recorded_and_loading_continues() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "Paises.zip", &countries(0..15));
    let sink = MemorySink::new();
    sink.set_unique_column("paises", "codigo").await;
    sink.seed_table(
        table_name("paises"),
        &["codigo", "nome"],
        vec![vec![Some("003".into()), Some("EXISTING".into())]],
    )
    .await;
    let policy = ResolvedPolicy {
        recreate_on_mismatch: true,
        truncate_existing: false,
    };

    let summary = run(&dir, vec![lookup_table("paises", "nome")], &sink, policy).await;

    let outcome = summary.table("paises").unwrap();
    assert_eq!(outcome.phase, TablePhase::Done);
    assert_eq!(outcome.rows_loaded, 14);
    assert_eq!(outcome.rows_rejected, 1);
    assert_eq!(sink.count_rows(&table_name("paises")).await.unwrap(), 15);
}
