//! # adforge-pipeline
//!
//! Chained orchestration of long-running remote media stages.
//!
//! This crate provides:
//!
//! - **[`StageBackend`]** trait -- the remote collaborator: submit a stage,
//!   poll a job, fetch an artifact.
//! - **[`JobSubmitter`]** -- validates and starts one stage.
//! - **[`StatusPoller`]** -- observes a remote job until it is terminal, under
//!   a bounded attempt budget ([`PollPolicy`]).
//! - **[`propagate`]** -- turns a completed stage into the next stage's input.
//! - **[`PipelineSpec`]** / **[`PipelineRun`]** -- the declarative stage list
//!   and the mutable execution record with its single [`Phase`].
//! - **[`PipelineOrchestrator`]** -- sequences the stages, reports progress,
//!   honours cancellation, and produces one terminal result.
//! - **[`DownloadFinalizer`]** -- retrieves and persists the final artifact.

pub mod backend;
pub mod context;
pub mod finalize;
pub mod orchestrator;
pub mod poller;
pub mod propagate;
pub mod run;
pub mod spec;
pub mod submitter;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at the crate root.
pub use backend::{ByteStream, StageBackend};
pub use context::{ProgressSender, RunContext};
pub use finalize::{DownloadFinalizer, DownloadedArtifact};
pub use orchestrator::PipelineOrchestrator;
pub use poller::{PollPolicy, StagePolicies, StatusPoller};
pub use run::{Phase, PipelineRun, ProgressUpdate, StageRecord};
pub use spec::PipelineSpec;
pub use submitter::JobSubmitter;
