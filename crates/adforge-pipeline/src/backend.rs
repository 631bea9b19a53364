//! The [`StageBackend`] trait is the only way the pipeline talks to the
//! remote transformation services.
//!
//! Implementations must surface every failure as an explicit error value.
//! Transient status-query failures should be reported as
//! [`Error::Poll`](adforge_core::Error::Poll) so the poller can retry them;
//! artifact transfer failures as
//! [`Error::Download`](adforge_core::Error::Download).

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use adforge_core::{JobId, JobStatus, MediaLocator, Result, StageKind, StageRequest, SubmitOutcome};

/// Streamed artifact payload.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Remote transformation backend.
#[async_trait]
pub trait StageBackend: Send + Sync {
    /// Start one stage.
    ///
    /// Called exactly once per stage attempt. Returns either a job handle to
    /// poll, or an already-completed status for stages the backend finishes
    /// within the round trip.
    async fn submit_stage(&self, request: &StageRequest) -> Result<SubmitOutcome>;

    /// Query the current status of a previously submitted job.
    async fn poll_stage(&self, kind: StageKind, job_id: &JobId) -> Result<JobStatus>;

    /// Open a byte stream over the artifact behind `locator`.
    async fn fetch_artifact(&self, locator: &MediaLocator) -> Result<ByteStream>;
}
