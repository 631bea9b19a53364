//! Starting one stage on the backend.

use std::sync::Arc;

use adforge_core::{Error, JobState, Result, StageRequest, SubmitOutcome};

use crate::backend::StageBackend;

/// Validates a [`StageRequest`] and starts it on the backend.
///
/// Every failure, local or remote, comes back as
/// [`Error::Submission`](adforge_core::Error::Submission). No retry happens
/// here.
#[derive(Clone)]
pub struct JobSubmitter {
    backend: Arc<dyn StageBackend>,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn StageBackend>) -> Self {
        Self { backend }
    }

    /// Submit one stage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Submission`] when the request is malformed, the
    /// backend refuses it, or a synchronous stage comes back failed or
    /// unfinished.
    pub async fn submit(&self, request: &StageRequest) -> Result<SubmitOutcome> {
        let kind = request.kind();
        request.validate()?;

        tracing::debug!(
            stage = %kind,
            inputs = request.input_locators.len(),
            "Submitting {}",
            request.params.summary()
        );

        let outcome = self.backend.submit_stage(request).await.map_err(|e| match e {
            Error::Submission { .. } => e,
            other => Error::submission(kind, other.message()),
        })?;

        match &outcome {
            SubmitOutcome::Accepted(job) => {
                if job.kind != kind {
                    return Err(Error::submission(
                        kind,
                        format!("backend accepted job {} as a {} stage", job.id, job.kind),
                    ));
                }
                tracing::info!(stage = %kind, job_id = %job.id, "Stage accepted");
            }
            SubmitOutcome::Finished(status) => match status.state {
                JobState::Completed => {
                    tracing::info!(stage = %kind, job_id = %status.id, "Stage finished synchronously");
                }
                JobState::Failed => {
                    return Err(Error::submission(
                        kind,
                        status
                            .message
                            .clone()
                            .unwrap_or_else(|| "backend reported failure".into()),
                    ));
                }
                state => {
                    return Err(Error::submission(
                        kind,
                        format!("synchronous response left job {} {state}", status.id),
                    ));
                }
            },
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{loc, ScriptedBackend, SubmitStep};
    use adforge_core::{
        CodecProfile, JobId, JobStatus, StageKind, StageParams, TargetResolution,
    };
    use assert_matches::assert_matches;

    fn upscale(inputs: &[&str]) -> StageRequest {
        StageRequest::template(StageParams::upscale(TargetResolution::Uhd4k))
            .with_inputs(inputs.iter().map(|s| loc(s)).collect())
    }

    #[tokio::test]
    async fn accepted_job_is_returned() {
        let backend = ScriptedBackend::new();
        backend.on_submit(
            StageKind::SuperResolutionUpscale,
            SubmitStep::Accept(JobId::from("up-1")),
        );

        let submitter = JobSubmitter::new(backend.clone());
        let outcome = submitter.submit(&upscale(&["in.mp4"])).await.unwrap();

        assert_matches!(outcome, SubmitOutcome::Accepted(job) if job.id.as_str() == "up-1");
        assert_eq!(backend.submits().len(), 1);
    }

    #[tokio::test]
    async fn malformed_request_never_reaches_backend() {
        let backend = ScriptedBackend::new();
        let submitter = JobSubmitter::new(backend.clone());

        let err = submitter.submit(&upscale(&[])).await.unwrap_err();

        assert_matches!(err, Error::Submission { stage: StageKind::SuperResolutionUpscale, .. });
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_rejection_carries_message() {
        let backend = ScriptedBackend::new();
        backend.on_submit(
            StageKind::SuperResolutionUpscale,
            SubmitStep::Reject("quota exceeded".into()),
        );

        let submitter = JobSubmitter::new(backend.clone());
        let err = submitter.submit(&upscale(&["in.mp4"])).await.unwrap_err();

        assert_eq!(err.message(), "quota exceeded");
        assert_eq!(err.to_string(), "Submission failed [upscale]: quota exceeded");
    }

    #[tokio::test]
    async fn synchronous_completion_passes_through() {
        let backend = ScriptedBackend::new();
        backend.on_submit(
            StageKind::CodecTranscode,
            SubmitStep::Finish(JobStatus::completed("tx-1", loc("out.mov"))),
        );

        let submitter = JobSubmitter::new(backend.clone());
        let req = StageRequest::template(StageParams::transcode(CodecProfile::Prores422Hq))
            .with_inputs(vec![loc("in.mp4")]);
        let outcome = submitter.submit(&req).await.unwrap();

        assert_matches!(
            outcome,
            SubmitOutcome::Finished(status) if status.result_locator == Some(loc("out.mov"))
        );
    }

    #[tokio::test]
    async fn synchronous_failure_is_submission_error() {
        let backend = ScriptedBackend::new();
        backend.on_submit(
            StageKind::CodecTranscode,
            SubmitStep::Finish(JobStatus::failed("tx-1", "unsupported source codec")),
        );

        let submitter = JobSubmitter::new(backend.clone());
        let req = StageRequest::template(StageParams::transcode(CodecProfile::Prores4444))
            .with_inputs(vec![loc("in.webm")]);
        let err = submitter.submit(&req).await.unwrap_err();

        assert_matches!(err, Error::Submission { stage: StageKind::CodecTranscode, .. });
        assert_eq!(err.message(), "unsupported source codec");
    }

    #[tokio::test]
    async fn synchronous_pending_is_rejected() {
        let backend = ScriptedBackend::new();
        backend.on_submit(
            StageKind::CodecTranscode,
            SubmitStep::Finish(JobStatus::pending("tx-1")),
        );

        let submitter = JobSubmitter::new(backend.clone());
        let req = StageRequest::template(StageParams::transcode(CodecProfile::default()))
            .with_inputs(vec![loc("in.mp4")]);
        let err = submitter.submit(&req).await.unwrap_err();
        assert!(err.to_string().contains("pending"), "got: {err}");
    }
}
