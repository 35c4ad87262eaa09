use std::path::Path;
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Directory receiving the rolling log files.
const LOG_DIRECTORY: &str = "logs";

const DEFAULT_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to forward `log` records to tracing: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log lines to the log file when dropped.
///
/// Keep it alive until the end of `main`.
#[must_use]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber: human readable lines on stdout and a daily rolling file
/// under `logs/`, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    init_tracing_in(app_name, Path::new(LOG_DIRECTORY))
}

pub fn init_tracing_in(app_name: &str, log_directory: &Path) -> Result<LogFlusher, TracingError> {
    // Dependencies such as rustls log through the `log` facade.
    LogTracer::init()?;

    let file_appender = tracing_appender::rolling::daily(log_directory, format!("{app_name}.log"));
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing through the test harness, once per process.
///
/// Silent unless `RUST_LOG` is set.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        // Another subscriber may already be installed by the test binary, which is fine.
        let _ = tracing_subscriber::registry()
            .with(env_filter("off"))
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
