use std::path::Path;

use cnpj_config::shared::{
    BatchConfig, ColumnConfig, CompositeIndexConfig, DestinationConfig, JoinStrategy,
    JsonLinesConfig, LoaderConfig, PolicyConfig, SourceConfig, TableConfig,
};

pub fn column(name: &str, typ: &str) -> ColumnConfig {
    ColumnConfig {
        name: name.to_string(),
        typ: typ.to_string(),
        index: false,
        trigram: false,
    }
}

/// A table of `TEXT` columns.
pub fn text_table(name: &str, columns: &[&str]) -> TableConfig {
    TableConfig {
        name: name.to_string(),
        file_prefix: None,
        columns: columns.iter().map(|name| column(name, "TEXT")).collect(),
        indexes: Vec::new(),
    }
}

/// A reference table declared like the registry's: an indexed code and its description.
pub fn lookup_table(name: &str, description_column: &str) -> TableConfig {
    let mut code = column("codigo", "VARCHAR(10)");
    code.index = true;

    TableConfig {
        name: name.to_string(),
        file_prefix: None,
        columns: vec![code, column(description_column, "TEXT")],
        indexes: Vec::new(),
    }
}

/// The `empresas` table with a trigram index on the corporate name and a composite index.
pub fn companies_table() -> TableConfig {
    let mut base = column("cnpj_basico", "VARCHAR(8)");
    base.index = true;
    let mut name = column("razao_social", "TEXT");
    name.trigram = true;

    TableConfig {
        name: "empresas".to_string(),
        file_prefix: None,
        columns: vec![
            base,
            name,
            column("natureza_juridica", "VARCHAR(10)"),
            column("qualificacao_responsavel", "VARCHAR(10)"),
            column("capital_social", "VARCHAR(20)"),
            column("porte", "VARCHAR(2)"),
            column("ente_federativo", "VARCHAR(255)"),
        ],
        indexes: vec![CompositeIndexConfig {
            name: "idx_empresas_natureza_porte".to_string(),
            columns: vec!["natureza_juridica".to_string(), "porte".to_string()],
        }],
    }
}

pub fn loader_config(
    source_dir: &Path,
    tables: Vec<TableConfig>,
    batch_size: usize,
    destination: DestinationConfig,
) -> LoaderConfig {
    LoaderConfig {
        source: SourceConfig::new(source_dir),
        batch: BatchConfig {
            max_size: batch_size,
        },
        policy: PolicyConfig::default(),
        tables,
        destination,
    }
}

pub fn json_lines_destination(output_dir: &Path, join_strategy: JoinStrategy) -> DestinationConfig {
    DestinationConfig::JsonLines(JsonLinesConfig {
        output_dir: output_dir.to_path_buf(),
        collection: "empresas".to_string(),
        join_strategy,
        track_all_ids: false,
    })
}
