use std::future::Future;

use cnpj_config::shared::ConnectRetryConfig;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Whether retrying can change the outcome of an error of this kind.
fn is_transient(kind: ErrorKind) -> bool {
    !matches!(
        kind,
        ErrorKind::AuthenticationError | ErrorKind::ConfigError | ErrorKind::EncryptionError
    )
}

/// Runs `operation` until it succeeds, at most `config.max_attempts` times, sleeping
/// `config.delay()` between attempts.
///
/// Authentication, configuration and TLS errors are returned immediately. When every
/// attempt fails the last error is wrapped in a [`ErrorKind::DestinationConnectionFailed`].
pub async fn retry_with_fixed_delay<T, F, Fut>(
    destination: &str,
    config: &ConnectRetryConfig,
    mut operation: F,
) -> EtlResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = EtlResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_transient(err.kind()) {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Destination is unreachable",
                format!("{destination}: gave up after {attempt} attempts"),
                source: err
            ));
        }

        warn!(
            destination,
            attempt,
            max_attempts,
            delay_ms = config.delay_ms,
            error = %err.summary(),
            "connection attempt failed, retrying"
        );
        sleep(config.delay()).await;
        attempt += 1;
    }
}
