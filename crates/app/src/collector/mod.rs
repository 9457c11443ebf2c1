//! Logging collector: accepts forwarded scans, keeps them in memory, and
//! appends each one to a CSV log.

mod log;
mod server;

use actix_web::web;
use anyhow::{Context, Result};
use tracing::info;

use crate::config::CollectorConfig;

pub use log::{CSV_HEADER, ScanLog};
pub use server::{CollectorServer, CollectorState, SAVED_MESSAGE, configure, spawn_collector};

/// Serve the collector until the process is interrupted.
pub fn run(config: CollectorConfig) -> Result<()> {
    let log = ScanLog::open(&config.log_file)
        .with_context(|| format!("failed to open scan log {}", config.log_file.display()))?;
    info!(log_file = %log.path().display(), "Appending scans to CSV log");

    let state = web::Data::new(CollectorState::new(log));
    let server = spawn_collector(config.bind, state.clone())?;
    server.wait();

    info!(scans = state.scans().len(), "Collector stopped");
    Ok(())
}
