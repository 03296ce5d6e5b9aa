//! Transmitter - pulls measurements, computes targets, relays them to the collector
//!
//! Usage:
//!   transmitter                                          run per RUN_MODE
//!   transmitter --seed <destination> "<YYYY-mm-dd HH:MM:SS>"   seed the SQLite sink and exit
//!
//! Environment variables:
//!   METER_FEED_URL - measurement feed endpoint (required)
//!   METER_SINK_URL - collector endpoint (required with SINK_BACKEND=http)
//!   METER_MAPPING_PATH - mapping file (default: config.dat)
//!   UPDATE_INTERVAL_MINUTES - polling cadence (default: 30)
//!   RUN_TTL_SECS - shared deadline per run (default: 600)
//!   SHUTDOWN_GRACE_SECS - wait after the deadline (default: 30)
//!   HTTP_TIMEOUT_SECS - HTTP client timeout (default: 30)
//!   SINK_BACKEND - http | sqlite (default: http)
//!   SINK_DB_PATH - SQLite sink path (default: data/meterflow.db)
//!   INCOMPLETE_RECORD_POLICY - skip | halt (default: skip)
//!   RUN_MODE - once | loop (default: once)
//!   RUST_LOG - log filter (default: info)

use dotenv::dotenv;
use log::{error, info};
use meterflow::config::{RunMode, RuntimeConfig, SinkBackend};
use meterflow::pipeline::{run_once, run_scheduler, OrchestratorConfig, PipelineServices, RunOrchestrator};
use meterflow::transmit_core::{parse_record_id, HttpFeed, HttpSink, RecordSink, SqliteSink, WindowResolver};
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let config = RuntimeConfig::from_env()?;

    env_logger::Builder::new()
        .parse_filters(&config.rust_log)
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|arg| arg == "--seed") {
        return seed(&config, args.get(idx + 1), args.get(idx + 2));
    }

    info!("🚀 Transmitter starting");
    info!("   ├─ Feed: {}", config.feed_url);
    info!("   ├─ Mapping: {}", config.mapping_path.display());
    info!("   ├─ Interval: {} min", config.update_interval.as_secs() / 60);
    info!("   ├─ Run TTL: {}s (grace {}s)", config.run_ttl.as_secs(), config.shutdown_grace.as_secs());
    info!("   ├─ Incomplete records: {}", config.policy);
    info!("   └─ Mode: {:?}", config.run_mode);

    let sink: Arc<dyn RecordSink> = match &config.sink {
        SinkBackend::Http { url } => Arc::new(HttpSink::new(url.clone(), config.http_timeout)?),
        SinkBackend::Sqlite { db_path } => Arc::new(SqliteSink::new(db_path)?),
    };
    info!("✅ Sink backend: {}", sink.backend_type());

    let services = PipelineServices {
        feed: Arc::new(HttpFeed::new(config.feed_url.clone(), config.http_timeout)?),
        sink,
        resolver: Arc::new(WindowResolver::new(chrono::Duration::from_std(config.update_interval)?)),
    };

    let orchestrator = RunOrchestrator::new(
        OrchestratorConfig {
            run_ttl: config.run_ttl,
            shutdown_grace: config.shutdown_grace,
            policy: config.policy,
        },
        services,
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Received Ctrl+C, shutting down...");
            signal_token.cancel();
        }
    });

    match config.run_mode {
        RunMode::Once => {
            let report = run_once(&orchestrator, &config.mapping_path, &shutdown).await?;
            println!("{}", report.to_json()?);
        }
        RunMode::Loop => {
            run_scheduler(&orchestrator, &config.mapping_path, config.update_interval, &shutdown).await;
        }
    }

    info!("✅ Transmitter stopped");
    Ok(())
}

fn seed(
    config: &RuntimeConfig,
    destination: Option<&String>,
    timestamp: Option<&String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(destination), Some(timestamp)) = (destination, timestamp) else {
        return Err("usage: transmitter --seed <destination> \"<YYYY-mm-dd HH:MM:SS>\"".into());
    };

    let SinkBackend::Sqlite { db_path } = &config.sink else {
        error!("❌ --seed requires SINK_BACKEND=sqlite");
        return Err("seeding is only supported by the sqlite sink".into());
    };

    let last = parse_record_id(timestamp).map_err(|e| format!("invalid timestamp '{}': {}", timestamp, e))?;
    SqliteSink::new(db_path)?.seed(destination, last)?;
    Ok(())
}
