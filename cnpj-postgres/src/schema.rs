use cnpj_config::shared::TableConfig;
use pg_escape::quote_identifier;
use std::fmt;

/// A fully qualified Postgres table name.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns `schema.name` with both parts quoted when Postgres requires it.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// One destination column. `typ` is the declared SQL type and is emitted verbatim.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: String,
    pub indexed: bool,
    pub trigram: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> ColumnSchema {
        Self {
            name: name.into(),
            typ: typ.into(),
            indexed: false,
            trigram: false,
        }
    }

    pub fn indexed(mut self) -> ColumnSchema {
        self.indexed = true;
        self
    }

    pub fn trigram(mut self) -> ColumnSchema {
        self.trigram = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IndexMethod {
    BTree,
    /// GIN with `gin_trgm_ops`, requires the `pg_trgm` extension.
    TrigramGin,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexSchema {
    pub name: String,
    pub table: TableName,
    pub columns: Vec<String>,
    pub method: IndexMethod,
}

/// Column order and indexes of one destination table.
///
/// The column order is also the positional order of the source files and of every bulk
/// payload written for the table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
    /// Indexes spanning more than one column. Single column indexes come from the columns.
    pub composite_indexes: Vec<(String, Vec<String>)>,
}

impl TableSchema {
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>) -> TableSchema {
        Self {
            name,
            column_schemas,
            composite_indexes: Vec::new(),
        }
    }

    pub fn from_config(schema: &str, config: &TableConfig) -> TableSchema {
        let column_schemas = config
            .columns
            .iter()
            .map(|column| ColumnSchema {
                name: column.name.clone(),
                typ: column.typ.clone(),
                indexed: column.index,
                trigram: column.trigram,
            })
            .collect();

        Self {
            name: TableName::new(schema, config.name.clone()),
            column_schemas,
            composite_indexes: config
                .indexes
                .iter()
                .map(|index| (index.name.clone(), index.columns.clone()))
                .collect(),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.column_schemas.iter().map(|column| column.name.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.column_schemas.len()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.column_names().position(|name| name == column)
    }

    /// Whether `live` lists exactly this table's columns, in order.
    pub fn matches_columns<S: AsRef<str>>(&self, live: &[S]) -> bool {
        live.len() == self.column_schemas.len()
            && live
                .iter()
                .zip(self.column_names())
                .all(|(live, declared)| live.as_ref() == declared)
    }

    /// Every index declared for the table, single column ones first.
    pub fn index_schemas(&self) -> Vec<IndexSchema> {
        let table = &self.name.name;
        let mut indexes = Vec::new();

        for column in &self.column_schemas {
            if column.indexed {
                indexes.push(IndexSchema {
                    name: format!("idx_{table}_{}", column.name),
                    table: self.name.clone(),
                    columns: vec![column.name.clone()],
                    method: IndexMethod::BTree,
                });
            }
            if column.trigram {
                indexes.push(IndexSchema {
                    name: format!("idx_{table}_{}_trgm", column.name),
                    table: self.name.clone(),
                    columns: vec![column.name.clone()],
                    method: IndexMethod::TrigramGin,
                });
            }
        }

        for (name, columns) in &self.composite_indexes {
            indexes.push(IndexSchema {
                name: name.clone(),
                table: self.name.clone(),
                columns: columns.clone(),
                method: IndexMethod::BTree,
            });
        }

        indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnpj_config::shared::{ColumnConfig, CompositeIndexConfig};

    fn establishments_config() -> TableConfig {
        let column = |name: &str, index: bool, trigram: bool| ColumnConfig {
            name: name.to_string(),
            typ: "TEXT".to_string(),
            index,
            trigram,
        };

        TableConfig {
            name: "estabelecimentos".to_string(),
            file_prefix: None,
            columns: vec![
                column("cnpj_basico", true, false),
                column("nome_fantasia", false, true),
                column("uf", false, false),
                column("situacao_cadastral", false, false),
            ],
            indexes: vec![CompositeIndexConfig {
                name: "idx_estab_uf_situacao".to_string(),
                columns: vec!["uf".to_string(), "situacao_cadastral".to_string()],
            }],
        }
    }

    #[test]
    fn quoted_identifier_escapes_only_when_needed() {
        assert_eq!(
            TableName::new("public", "empresas").as_quoted_identifier(),
            "public.empresas"
        );
        assert_eq!(
            TableName::new("public", "Empresas").as_quoted_identifier(),
            "public.\"Empresas\""
        );
    }

    #[test]
    fn index_schemas_follow_column_flags_and_composites() {
        let schema = TableSchema::from_config("public", &establishments_config());
        let names: Vec<_> = schema
            .index_schemas()
            .into_iter()
            .map(|index| (index.name, index.method))
            .collect();

        assert_eq!(
            names,
            vec![
                (
                    "idx_estabelecimentos_cnpj_basico".to_string(),
                    IndexMethod::BTree
                ),
                (
                    "idx_estabelecimentos_nome_fantasia_trgm".to_string(),
                    IndexMethod::TrigramGin
                ),
                ("idx_estab_uf_situacao".to_string(), IndexMethod::BTree),
            ]
        );
    }

    #[test]
    fn column_match_is_order_sensitive() {
        let schema = TableSchema::new(
            TableName::new("public", "paises"),
            vec![ColumnSchema::new("codigo", "TEXT"), ColumnSchema::new("nome", "TEXT")],
        );

        assert!(schema.matches_columns(&["codigo", "nome"]));
        assert!(!schema.matches_columns(&["nome", "codigo"]));
        assert!(!schema.matches_columns(&["codigo"]));
    }
}
