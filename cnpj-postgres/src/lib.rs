//! Destination table schemas and the SQL statements the loader issues against Postgres.

pub mod schema;
pub mod sql;

pub use schema::{ColumnSchema, IndexMethod, IndexSchema, TableName, TableSchema};
