//! Shared configuration types for the loader pipelines.

mod base;
mod batch;
mod connection;
mod destination;
mod loader;
mod policy;
mod retry;
mod source;
mod table;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::{
    IntoConnectOptions, LOADER_CONNECTION_OPTIONS, PgConnectionConfig, PgConnectionOptions,
    TcpKeepaliveConfig, TlsConfig,
};
pub use destination::{DestinationConfig, JoinStrategy, JsonLinesConfig, PostgresConfig};
pub use loader::LoaderConfig;
pub use policy::{PolicyChoice, PolicyConfig};
pub use retry::ConnectRetryConfig;
pub use source::SourceConfig;
pub use table::{ColumnConfig, CompositeIndexConfig, TableConfig, title_case};
