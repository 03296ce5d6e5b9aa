//! Source pipelines and their orchestration
//!
//! - `context` - per-run state owned by a source worker
//! - `runner` - the resolve/fetch/decode/aggregate/send sequence for one source
//! - `orchestrator` - one worker per source with a shared deadline
//! - `scheduler` - single run or periodic runs
//! - `report` - per-source and per-run summaries

pub mod context;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use context::{IncompleteRecordPolicy, PipelineContext};
pub use orchestrator::{OrchestratorConfig, RunOrchestrator};
pub use report::{DeliveryStats, RunReport, SourceOutcome, SourceReport};
pub use runner::{run_source_pipeline, PipelineError, PipelineServices};
pub use scheduler::{run_once, run_scheduler};
