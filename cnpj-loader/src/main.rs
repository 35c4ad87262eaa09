//! Registry loader binary.
//!
//! Loads configuration, resolves the destructive operation policy with the operator and
//! runs the pipeline matching the configured destination. Exits non-zero when the run
//! fails or leaves any table unloaded.

use std::process::ExitCode;

use cnpj_config::shared::LoaderConfig;
use cnpj_etl::loader::ResolvedPolicy;
use cnpj_telemetry::tracing::init_tracing;
use tracing::warn;

use crate::config::load_loader_config;
use crate::core::{RunStatus, start_loader_with_config};
use crate::error::{LoaderError, LoaderResult};
use crate::policy::resolve_policy;

mod config;
mod core;
mod error;
mod policy;

fn main() -> ExitCode {
    match run() {
        Ok(RunStatus::Complete) => ExitCode::SUCCESS,
        Ok(RunStatus::Incomplete) => ExitCode::FAILURE,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> LoaderResult<RunStatus> {
    let loader_config = load_loader_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(LoaderError::config)?;

    // Prompts happen before the runtime starts so nothing else writes to the terminal.
    let policy = resolve_policy(&loader_config.policy)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(loader_config, policy))
}

async fn async_main(loader_config: LoaderConfig, policy: ResolvedPolicy) -> LoaderResult<RunStatus> {
    tokio::select! {
        result = start_loader_with_config(loader_config, policy) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("interrupt received, stopping the run");
            Err(LoaderError::Interrupted)
        }
    }
}
