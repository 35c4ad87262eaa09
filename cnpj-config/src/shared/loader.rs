use serde::Deserialize;
use std::collections::HashSet;

use crate::Config;
use crate::shared::{
    BatchConfig, DestinationConfig, PolicyConfig, SourceConfig, TableConfig, ValidationError,
};

/// Complete configuration of one loader run.
///
/// Tables are processed in the order they are declared, so lookup tables must come before
/// the tables that reference them.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    pub tables: Vec<TableConfig>,
    pub destination: DestinationConfig,
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.batch.validate()?;
        self.destination.validate()?;

        if self.tables.is_empty() {
            return Err(ValidationError::invalid(
                "tables",
                "must declare at least one table",
            ));
        }

        let mut names = HashSet::new();
        for table in &self.tables {
            table.validate()?;
            if !names.insert(table.name.as_str()) {
                return Err(ValidationError::DuplicateTable(table.name.clone()));
            }
        }

        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
