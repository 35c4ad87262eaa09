use thiserror::Error;

/// Errors raised when a configuration value is present but unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },

    #[error("invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,

    #[error("table `{0}` is declared more than once")]
    DuplicateTable(String),

    #[error("table `{table}` declares an index on unknown column `{column}`")]
    UnknownIndexColumn { table: String, column: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}
