use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::{ConnectRetryConfig, PgConnectionConfig, ValidationError};

/// Where the loader writes its output.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the database
/// password into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Normalized tables bulk-loaded with `COPY`.
    Postgres(PostgresConfig),
    /// Nested company documents written as JSON lines.
    JsonLines(JsonLinesConfig),
    /// Normalized tables kept in process memory. Useful for dry runs.
    Memory,
}

impl DestinationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DestinationConfig::Postgres(config) => {
                config.connection.validate()?;
                config.connect_retry.validate()
            }
            DestinationConfig::JsonLines(config) => config.validate(),
            DestinationConfig::Memory => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub connection: PgConnectionConfig,
    #[serde(default)]
    pub connect_retry: ConnectRetryConfig,
    /// Destination schema of the loaded tables.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Strategy used to find the child rows of each parent row.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Child tables are indexed in memory by key before the parent pass.
    #[default]
    Hash,
    /// Parent and child tables are both sorted by key and merged with bounded look-ahead.
    SortedMerge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonLinesConfig {
    pub output_dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub join_strategy: JoinStrategy,
    /// Remembers every written `_id` to reject duplicates anywhere in the file.
    ///
    /// Memory grows with the number of documents. When off, a document is only compared
    /// with the previous one, which finds every duplicate when parents arrive sorted by key
    /// as they do with [`JoinStrategy::SortedMerge`].
    #[serde(default)]
    pub track_all_ids: bool,
}

impl JsonLinesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.collection.trim().is_empty() {
            return Err(ValidationError::invalid(
                "destination.json_lines.collection",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_collection() -> String {
    "empresas".to_string()
}
