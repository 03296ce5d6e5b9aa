//! Run scheduling
//!
//! `run_once` performs a single orchestrated run. `run_scheduler` repeats it
//! every polling period until the shutdown token is cancelled, re-reading the
//! mapping file before each run so edits apply without a restart.

use crate::mapping::{load_mapping_blocks, LoaderError};
use crate::pipeline::orchestrator::RunOrchestrator;
use crate::pipeline::report::RunReport;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Load the mapping file and run every source once
pub async fn run_once(
    orchestrator: &RunOrchestrator,
    mapping_path: &Path,
    shutdown: &CancellationToken,
) -> Result<RunReport, LoaderError> {
    let blocks = load_mapping_blocks(mapping_path)?;
    log::info!("📄 Loaded {} mapping block(s) from {}", blocks.len(), mapping_path.display());

    Ok(orchestrator.run(&blocks, shutdown).await)
}

/// Run every `period` until `shutdown` is cancelled; returns the number of completed runs
///
/// A mapping file that cannot be read skips that run only.
pub async fn run_scheduler(
    orchestrator: &RunOrchestrator,
    mapping_path: &Path,
    period: Duration,
    shutdown: &CancellationToken,
) -> usize {
    log::info!("⏰ Starting scheduler (interval: {:?})", period);

    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut runs = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = timer.tick() => {}
        }

        match run_once(orchestrator, mapping_path, shutdown).await {
            Ok(report) => {
                runs += 1;
                match report.to_json() {
                    Ok(json) => log::debug!("Run summary: {}", json),
                    Err(e) => log::warn!("⚠️  Failed to serialize run summary: {}", e),
                }
            }
            Err(e) => log::error!("❌ Skipping run: {}", e),
        }

        if shutdown.is_cancelled() {
            break;
        }
    }

    log::info!("🛑 Scheduler stopped after {} run(s)", runs);
    runs
}
