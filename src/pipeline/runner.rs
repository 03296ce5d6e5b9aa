//! One source, one run: resolve window -> fetch -> decode -> aggregate -> send

use crate::pipeline::context::{IncompleteRecordPolicy, PipelineContext};
use crate::pipeline::report::{DeliveryStats, SourceOutcome, SourceReport};
use crate::transmit_core::{
    decode_feed, format_record_id, Aggregator, Delivery, FeedError, HaltReason, MeasurementFeed,
    RecordSink, TransmissionSequencer, WindowError, WindowResolver,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("window unavailable: {0}")]
    Window(#[from] WindowError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FeedError),
}

/// Shared backends, cloned into every source worker
#[derive(Clone)]
pub struct PipelineServices {
    pub feed: Arc<dyn MeasurementFeed>,
    pub sink: Arc<dyn RecordSink>,
    pub resolver: Arc<WindowResolver>,
}

/// Run the full pipeline for the source in `ctx`
///
/// Never fails: every error is folded into the returned report.
pub async fn run_source_pipeline(ctx: &PipelineContext, services: &PipelineServices) -> SourceReport {
    let source = ctx.spec.source_id().to_string();
    let destination = ctx.spec.destination_id().to_string();
    let mut stats = DeliveryStats::default();

    let (outcome, detail) = match run_stages(ctx, services, &mut stats).await {
        Ok(result) => result,
        Err(e) => {
            let outcome = match e {
                PipelineError::Window(_) => SourceOutcome::WindowUnavailable,
                PipelineError::Fetch(_) => SourceOutcome::FetchFailed,
            };
            log::error!("❌ {}: {}", source, e);
            (outcome, Some(e.to_string()))
        }
    };

    log::info!(
        "📊 {} -> {}: {:?} ({} decoded, {} sent, {} acknowledged)",
        source,
        destination,
        outcome,
        stats.decoded,
        stats.attempted,
        stats.acknowledged
    );

    SourceReport {
        source,
        destination: Some(destination),
        outcome,
        detail,
        stats,
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    services: &PipelineServices,
    stats: &mut DeliveryStats,
) -> Result<(SourceOutcome, Option<String>), PipelineError> {
    let spec = &ctx.spec;
    let source = spec.source_id();
    let destination = spec.destination_id();

    if !spec.has_targets() {
        log::warn!("⚠️  {}: no targets declared, skipping", source);
        return Ok((SourceOutcome::NoTargets, None));
    }

    let Some(window) = services
        .resolver
        .resolve(services.sink.as_ref(), destination)
        .await?
    else {
        return Ok((SourceOutcome::UpToDate, None));
    };

    if ctx.should_stop() {
        log::warn!("⏹️  {}: stopped before fetch", source);
        return Ok((SourceOutcome::Cancelled, None));
    }

    log::info!(
        "📥 {}: fetching {} -> {}",
        source,
        format_record_id(&window.start()),
        format_record_id(&window.end())
    );

    // Nothing has been delivered yet, so an in-flight fetch can be dropped
    let body = tokio::select! {
        _ = ctx.stop.cancelled() => {
            log::warn!("⏹️  {}: stopped during fetch", source);
            return Ok((SourceOutcome::Cancelled, None));
        }
        body = services.feed.fetch(source, spec.dependents(), &window) => body?,
    };

    let decoded = decode_feed(&body);
    stats.decoded = decoded.records.len();
    stats.malformed_skipped = decoded.malformed.len();
    ctx.publish(stats);

    if decoded.records.is_empty() {
        log::info!("📭 {}: no records in window", source);
        return Ok((SourceOutcome::Completed, None));
    }

    let aggregator = Aggregator::new(spec);
    let mut sequencer = TransmissionSequencer::new(services.sink.as_ref(), destination);
    let mut cancelled = false;

    for raw in &decoded.records {
        if ctx.should_stop() {
            log::warn!("⏹️  {}: stopped before {}", source, format_record_id(&raw.timestamp));
            cancelled = true;
            break;
        }

        match aggregator.resolve(raw) {
            Ok(record) => {
                let delivery = sequencer.deliver(&record).await;
                record_progress(&sequencer, stats);
                ctx.publish(stats);
                if delivery != Delivery::Acknowledged {
                    break;
                }
            }
            Err(e) => match ctx.policy {
                IncompleteRecordPolicy::Skip => {
                    log::warn!("⏭️  {}: skipping {}", source, e);
                    stats.incomplete_skipped += 1;
                    ctx.publish(stats);
                }
                IncompleteRecordPolicy::Halt => {
                    log::warn!("🛑 {}: {}", source, e);
                    sequencer.halt(HaltReason::IncompleteRecord {
                        record_id: format_record_id(&raw.timestamp),
                    });
                    break;
                }
            },
        }
    }

    record_progress(&sequencer, stats);

    if let Some(reason) = sequencer.halt_reason() {
        return Ok((SourceOutcome::Halted, Some(reason.to_string())));
    }
    if cancelled {
        return Ok((SourceOutcome::Cancelled, None));
    }
    Ok((SourceOutcome::Completed, None))
}

fn record_progress(sequencer: &TransmissionSequencer<'_>, stats: &mut DeliveryStats) {
    stats.attempted = sequencer.attempted();
    stats.acknowledged = sequencer.acknowledged();
    stats.last_acknowledged = sequencer.last_acknowledged().as_ref().map(format_record_id);
}
