//! The ingestion pipeline.
//!
//! Discovery inserts candidates and queues `fetch` jobs. The fetch worker
//! queues `analyze`, and the analysis worker queues `translate`. Every edge
//! between stages is a durable job row that the [`QueueCoordinator`] claims
//! and retries; the [`StaleJobReaper`] fails jobs abandoned mid-run.

pub mod analysis;
pub mod discovery;
pub mod fetch;
pub mod queue;
pub mod reaper;
pub mod scheduler;
pub mod translation;

pub use analysis::{AnalysisOutcome, AnalysisWorker};
pub use discovery::{Discovery, DiscoveryReport};
pub use fetch::{FetchOutcome, FetchWorker};
pub use queue::{JobOutcome, QueueCoordinator, TickOutcome};
pub use reaper::{ReapReport, StaleJobReaper};
pub use scheduler::PipelineScheduler;
pub use translation::{TranslationOutcome, TranslationWorker};
