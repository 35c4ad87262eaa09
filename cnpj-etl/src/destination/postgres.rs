use std::io::BufReader;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use cnpj_config::shared::{IntoConnectOptions, LOADER_CONNECTION_OPTIONS, PgConnectionConfig};
use cnpj_postgres::sql;
use futures::SinkExt;
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, info};

use crate::destination::{CopyOutcome, TableSink};
use crate::error::EtlResult;
use crate::types::{IndexSchema, TableName, TableSchema};

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    // The client terminates the connection when dropped, the handle is not needed.
    tokio::spawn(async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    });
}

/// Bulk loads normalized tables into Postgres with `COPY ... FROM STDIN`.
///
/// Every batch is one `COPY` statement, so a rejected batch leaves no partial rows behind.
#[derive(Clone)]
pub struct PostgresSink {
    client: Arc<Client>,
}

impl PostgresSink {
    /// Connects to the destination database using TLS when configured.
    pub async fn connect(config: &PgConnectionConfig) -> EtlResult<PostgresSink> {
        let pg_config: Config = config.with_db(Some(&LOADER_CONNECTION_OPTIONS));

        let client = if config.tls.enabled {
            let mut root_store = rustls::RootCertStore::empty();
            let mut root_certs_reader = BufReader::new(config.tls.trusted_root_certs.as_bytes());
            for cert in rustls_pemfile::certs(&mut root_certs_reader) {
                let cert = cert?;
                root_store.add(cert)?;
            }

            let tls_config = ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let (client, connection) = pg_config.connect(MakeRustlsConnect::new(tls_config)).await?;
            spawn_postgres_connection::<MakeRustlsConnect>(connection);
            info!(host = %config.host, "connected to postgres with tls");
            client
        } else {
            let (client, connection) = pg_config.connect(NoTls).await?;
            spawn_postgres_connection::<NoTls>(connection);
            info!(host = %config.host, "connected to postgres without tls");
            client
        };

        Ok(PostgresSink::from_client(client))
    }

    pub fn from_client(client: Client) -> PostgresSink {
        PostgresSink {
            client: Arc::new(client),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl TableSink for PostgresSink {
    fn name() -> &'static str {
        "postgres"
    }

    async fn prepare(&self) -> EtlResult<()> {
        self.client
            .batch_execute(sql::CREATE_TRIGRAM_EXTENSION)
            .await?;

        Ok(())
    }

    async fn describe_columns(&self, table: &TableName) -> EtlResult<Option<Vec<String>>> {
        let rows = self
            .client
            .query(sql::DESCRIBE_COLUMNS, &[&table.schema, &table.name])
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get::<_, String>(0)?);
        }

        Ok(Some(columns))
    }

    async fn create_table(&self, schema: &TableSchema) -> EtlResult<()> {
        self.client
            .batch_execute(&sql::create_table(schema))
            .await?;

        Ok(())
    }

    async fn drop_table(&self, table: &TableName) -> EtlResult<()> {
        self.client.batch_execute(&sql::drop_table(table)).await?;

        Ok(())
    }

    async fn count_rows(&self, table: &TableName) -> EtlResult<u64> {
        let row = self.client.query_one(sql::count_rows(table).as_str(), &[]).await?;
        let count: i64 = row.try_get(0)?;

        Ok(count.max(0) as u64)
    }

    async fn truncate_table(&self, table: &TableName) -> EtlResult<()> {
        self.client
            .batch_execute(&sql::truncate_table(table))
            .await?;

        Ok(())
    }

    async fn copy_rows(
        &self,
        schema: &TableSchema,
        payload: Bytes,
        rows: usize,
    ) -> EtlResult<CopyOutcome> {
        let statement = sql::copy_in(schema);
        let sink = self.client.copy_in::<_, Bytes>(statement.as_str()).await?;
        let mut sink = pin!(sink);

        sink.send(payload).await?;
        let accepted = sink.as_mut().finish().await?;

        debug!(table = %schema.name, rows, accepted, "copied batch");

        Ok(CopyOutcome {
            accepted,
            rejected: 0,
        })
    }

    async fn create_index(&self, index: &IndexSchema) -> EtlResult<()> {
        self.client
            .batch_execute(&sql::create_index(index))
            .await?;

        Ok(())
    }

    async fn analyze(&self) -> EtlResult<()> {
        self.client.batch_execute(sql::ANALYZE).await?;

        Ok(())
    }
}
