//! Run orchestration: one worker per source, a shared deadline, bounded shutdown
//!
//! Sources are independent. A block that does not parse, a collector that
//! knows nothing about a destination, or a worker that panics only affects
//! its own report. When the deadline passes every worker is asked to stop
//! before its next record; workers still running after the grace period are
//! aborted.

use crate::mapping::AggregationSpec;
use crate::pipeline::context::{IncompleteRecordPolicy, PipelineContext};
use crate::pipeline::report::{DeliveryStats, RunReport, SourceOutcome, SourceReport};
use crate::pipeline::runner::{run_source_pipeline, PipelineServices};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Shared deadline for all sources of one run
    pub run_ttl: Duration,
    /// Time workers get to finish their current record after the deadline
    pub shutdown_grace: Duration,
    pub policy: IncompleteRecordPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            run_ttl: Duration::from_secs(600),
            shutdown_grace: Duration::from_secs(30),
            policy: IncompleteRecordPolicy::Skip,
        }
    }
}

struct Worker {
    source: String,
    destination: String,
    handle: JoinHandle<SourceReport>,
    progress: watch::Receiver<DeliveryStats>,
}

pub struct RunOrchestrator {
    config: OrchestratorConfig,
    services: PipelineServices,
}

impl RunOrchestrator {
    pub fn new(config: OrchestratorConfig, services: PipelineServices) -> Self {
        Self { config, services }
    }

    /// Run every mapping block once
    ///
    /// `shutdown` is the process-wide token; cancelling it stops workers the
    /// same way the deadline does, and starts the grace period right away.
    pub async fn run(&self, blocks: &[String], shutdown: &CancellationToken) -> RunReport {
        let started = Instant::now();
        let deadline = started + self.config.run_ttl;
        let stop = shutdown.child_token();

        log::info!("🚀 Starting run: {} source block(s), deadline {:?}", blocks.len(), self.config.run_ttl);

        let mut reports = Vec::with_capacity(blocks.len());
        let mut workers = Vec::new();

        for (index, block) in blocks.iter().enumerate() {
            let spec = match AggregationSpec::parse(block) {
                Ok(spec) => spec,
                Err(e) => {
                    let label = format!("block #{}", index + 1);
                    log::error!("❌ {}: invalid mapping: {}", label, e);
                    reports.push(
                        SourceReport::new(label, None, SourceOutcome::ConfigError).with_detail(e.to_string()),
                    );
                    continue;
                }
            };

            let source = spec.source_id().to_string();
            let destination = spec.destination_id().to_string();
            let ctx = PipelineContext::new(spec, self.config.policy, stop.child_token());
            let progress = ctx.subscribe();
            let services = self.services.clone();

            log::debug!("🧵 Spawning worker for {} -> {}", source, destination);
            let handle = tokio::spawn(async move { run_source_pipeline(&ctx, &services).await });

            workers.push(Worker {
                source,
                destination,
                handle,
                progress,
            });
        }

        let mut deadline_exceeded = false;
        let mut grace_end: Option<Instant> = None;

        for mut worker in workers {
            let until = match grace_end {
                Some(end) => end,
                None => {
                    tokio::select! {
                        biased;
                        joined = &mut worker.handle => {
                            reports.push(joined_report(&worker, joined));
                            continue;
                        }
                        _ = sleep_until(deadline) => {
                            log::warn!("⏰ Run deadline reached, stopping workers");
                            deadline_exceeded = true;
                        }
                        _ = stop.cancelled() => {
                            log::warn!("🛑 Shutdown requested, stopping workers");
                        }
                    }
                    stop.cancel();
                    let end = Instant::now() + self.config.shutdown_grace;
                    grace_end = Some(end);
                    end
                }
            };

            let report = match timeout_at(until, &mut worker.handle).await {
                Ok(joined) => joined_report(&worker, joined),
                Err(_) => {
                    log::error!("💀 {}: still running after grace period, aborting", worker.source);
                    worker.handle.abort();
                    let mut report = SourceReport::new(
                        worker.source.clone(),
                        Some(worker.destination.clone()),
                        SourceOutcome::Aborted,
                    );
                    report.stats = worker.progress.borrow().clone();
                    report
                }
            };
            reports.push(report);
        }

        let report = RunReport {
            sources: reports,
            elapsed_ms: started.elapsed().as_millis() as u64,
            deadline_exceeded,
        };

        log::info!(
            "🏁 Run finished in {}ms: {} source(s), {} failed, {} record(s) acknowledged",
            report.elapsed_ms,
            report.sources.len(),
            report.failed(),
            report.total_acknowledged()
        );

        report
    }
}

fn joined_report(worker: &Worker, joined: Result<SourceReport, JoinError>) -> SourceReport {
    match joined {
        Ok(report) => report,
        Err(e) => {
            log::error!("💥 {}: worker failed: {}", worker.source, e);
            let outcome = if e.is_panic() {
                SourceOutcome::Panicked
            } else {
                SourceOutcome::Aborted
            };
            SourceReport::new(worker.source.clone(), Some(worker.destination.clone()), outcome)
                .with_detail(e.to_string())
        }
    }
}
