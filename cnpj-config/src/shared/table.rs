use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::shared::ValidationError;

/// Declaration of one source table and its destination shape.
///
/// Column order is the positional order of fields in the source files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TableConfig {
    pub name: String,
    /// File name prefix of the table's source files. Defaults to the title-cased name.
    #[serde(default)]
    pub file_prefix: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub indexes: Vec<CompositeIndexConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnConfig {
    pub name: String,
    /// Destination SQL type, e.g. `VARCHAR(8)` or `TEXT`.
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub index: bool,
    /// Adds a trigram GIN index for fuzzy text search.
    #[serde(default)]
    pub trigram: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositeIndexConfig {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableConfig {
    /// Prefix used to discover this table's files in the source directory.
    pub fn file_prefix(&self) -> String {
        match &self.file_prefix {
            Some(prefix) => prefix.clone(),
            None => title_case(&self.name),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("tables.name", "must not be empty"));
        }
        if self.columns.is_empty() {
            return Err(ValidationError::invalid(
                format!("tables.{}.columns", self.name),
                "must declare at least one column",
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::invalid(
                    format!("tables.{}.columns", self.name),
                    format!("column `{}` is declared more than once", column.name),
                ));
            }
            if column.typ.trim().is_empty() {
                return Err(ValidationError::invalid(
                    format!("tables.{}.columns.{}.type", self.name, column.name),
                    "must not be empty",
                ));
            }
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(ValidationError::invalid(
                    format!("tables.{}.indexes.{}", self.name, index.name),
                    "must list at least one column",
                ));
            }
            if let Some(column) = index.columns.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(ValidationError::UnknownIndexColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Upper-cases the first character, e.g. `estabelecimentos` becomes `Estabelecimentos`.
pub fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.map(|c| c.to_ascii_lowercase())).collect(),
        None => String::new(),
    }
}
