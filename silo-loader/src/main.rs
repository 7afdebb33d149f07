//! Warehouse loader service binary.
//!
//! Loads configuration once, initializes tracing, and runs the two dataset
//! pipelines sequentially: transactions (relational store, CSV staging)
//! then trades (document store, JSON staging). Any pipeline failure stops
//! the run and surfaces through the exit status.

use silo::error::{ErrorKind, SiloResult};
use silo::silo_error;
use silo_config::load_config;
use silo_config::shared::LoaderConfig;
use silo_telemetry::tracing::init_tracing;
use tracing::info;

mod datasets;

/// Entry point for the loader service.
///
/// Configuration problems surface before the runtime starts so a
/// misconfigured deployment fails immediately.
fn main() -> SiloResult<()> {
    let config = load_config::<LoaderConfig>().map_err(|err| {
        silo_error!(
            ErrorKind::ConfigError,
            "failed to load loader configuration",
            source: err
        )
    })?;
    config.validate().map_err(|err| {
        silo_error!(
            ErrorKind::ConfigError,
            "loader configuration failed validation",
            source: err
        )
    })?;

    init_tracing(env!("CARGO_BIN_NAME")).map_err(|err| {
        silo_error!(
            ErrorKind::ConfigError,
            "failed to initialize tracing",
            source: err
        )
    })?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            silo_error!(
                ErrorKind::Unknown,
                "failed to start the async runtime",
                source: err
            )
        })?
        .block_on(run(config))
}

/// Runs both dataset pipelines, one merge per transaction, sequentially.
///
/// Sequential execution also serializes merges, so the loader never races
/// itself on a target table.
async fn run(config: LoaderConfig) -> SiloResult<()> {
    info!("starting warehouse loader");

    let report = datasets::transactions::run(&config).await?;
    info!(
        rows_fetched = report.rows_fetched,
        rows_updated = report.merge.rows_updated,
        rows_inserted = report.merge.rows_inserted,
        "transactions dataset loaded"
    );

    let report = datasets::trades::run(&config).await?;
    info!(
        rows_fetched = report.rows_fetched,
        rows_updated = report.merge.rows_updated,
        rows_inserted = report.merge.rows_inserted,
        "trades dataset loaded"
    );

    info!("warehouse loader finished");

    Ok(())
}
