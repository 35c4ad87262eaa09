//! Core data types shared by the source, grouping, assembly and loading stages.

mod row;

pub use row::{GroupKey, SourceRow};

pub use cnpj_postgres::schema::{ColumnSchema, IndexMethod, IndexSchema, TableName, TableSchema};
