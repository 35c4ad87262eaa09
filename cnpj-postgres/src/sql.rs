//! Statement builders. Identifiers are quoted, declared column types are emitted as configured.

use pg_escape::quote_identifier;

use crate::schema::{IndexMethod, IndexSchema, TableName, TableSchema};

/// Live column names of a table in ordinal order. Parameters: schema, table.
pub const DESCRIBE_COLUMNS: &str = "select column_name::text from information_schema.columns \
     where table_schema = $1::text and table_name = $2::text order by ordinal_position";

pub const CREATE_TRIGRAM_EXTENSION: &str = "create extension if not exists pg_trgm";

pub const ANALYZE: &str = "analyze";

pub fn create_table(schema: &TableSchema) -> String {
    let columns = schema
        .column_schemas
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), column.typ))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "create table {} ({columns})",
        schema.name.as_quoted_identifier()
    )
}

pub fn drop_table(table: &TableName) -> String {
    format!(
        "drop table if exists {} cascade",
        table.as_quoted_identifier()
    )
}

pub fn truncate_table(table: &TableName) -> String {
    format!("truncate table {}", table.as_quoted_identifier())
}

pub fn count_rows(table: &TableName) -> String {
    format!("select count(*) from {}", table.as_quoted_identifier())
}

/// `COPY ... FROM STDIN` in text format: tab delimited, `\N` as null.
pub fn copy_in(schema: &TableSchema) -> String {
    format!(
        "copy {} ({}) from stdin with (format text)",
        schema.name.as_quoted_identifier(),
        column_list(schema.column_names())
    )
}

pub fn create_index(index: &IndexSchema) -> String {
    let columns = match index.method {
        IndexMethod::BTree => column_list(index.columns.iter().map(String::as_str)),
        IndexMethod::TrigramGin => index
            .columns
            .iter()
            .map(|column| format!("{} gin_trgm_ops", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", "),
    };
    let using = match index.method {
        IndexMethod::BTree => "",
        IndexMethod::TrigramGin => " using gin",
    };

    format!(
        "create index if not exists {} on {}{using} ({columns})",
        quote_identifier(&index.name),
        index.table.as_quoted_identifier()
    )
}

fn column_list<'a>(columns: impl Iterator<Item = &'a str>) -> String {
    columns
        .map(|column| quote_identifier(column).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;

    fn simples() -> TableSchema {
        TableSchema::new(
            TableName::new("public", "simples"),
            vec![
                ColumnSchema::new("cnpj_basico", "VARCHAR(8) PRIMARY KEY"),
                ColumnSchema::new("opcao_simples", "VARCHAR(1)"),
            ],
        )
    }

    #[test]
    fn create_table_keeps_declared_order_and_types() {
        assert_eq!(
            create_table(&simples()),
            "create table public.simples (cnpj_basico VARCHAR(8) PRIMARY KEY, opcao_simples VARCHAR(1))"
        );
    }

    #[test]
    fn copy_in_lists_columns_in_schema_order() {
        assert_eq!(
            copy_in(&simples()),
            "copy public.simples (cnpj_basico, opcao_simples) from stdin with (format text)"
        );
    }

    #[test]
    fn trigram_index_uses_gin_operator_class() {
        let index = IndexSchema {
            name: "idx_empresas_razao_social_trgm".to_string(),
            table: TableName::new("public", "empresas"),
            columns: vec!["razao_social".to_string()],
            method: IndexMethod::TrigramGin,
        };

        assert_eq!(
            create_index(&index),
            "create index if not exists idx_empresas_razao_social_trgm on public.empresas using gin (razao_social gin_trgm_ops)"
        );
    }

    #[test]
    fn drop_cascades() {
        assert_eq!(
            drop_table(&TableName::new("public", "socios")),
            "drop table if exists public.socios cascade"
        );
    }
}
