//! Pipeline orchestrator: drives a [`PipelineSpec`] stage by stage through
//! submit, poll and hand-off, and produces one terminal [`PipelineRun`].
//!
//! ```text
//! Idle -> Submitting(0) -> [Polling(0)] -> Propagating(0->1) -> Submitting(1) -> ...
//!      -> Completed | Failed | Cancelled
//! ```
//!
//! Stage N+1 is never submitted before stage N has completed with a result
//! locator. The first failure ends the run; earlier stage outputs are not
//! surfaced. Cancellation is observed at every suspension point and after
//! every remote call, and a job already running remotely is left alone.

use std::sync::Arc;

use adforge_core::events::EventPayload;
use adforge_core::{
    Error, JobDescriptor, JobState, JobStatus, MediaLocator, Result, SubmitOutcome,
};

use crate::backend::StageBackend;
use crate::context::RunContext;
use crate::poller::{StagePolicies, StatusPoller};
use crate::propagate;
use crate::run::{Phase, PipelineRun};
use crate::spec::PipelineSpec;
use crate::submitter::JobSubmitter;

/// Runs pipelines against one backend.
///
/// The orchestrator holds no per-run state, so one instance can drive any
/// number of independent runs concurrently.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    backend: Arc<dyn StageBackend>,
    submitter: JobSubmitter,
    policies: StagePolicies,
}

impl PipelineOrchestrator {
    pub fn new(backend: Arc<dyn StageBackend>, policies: StagePolicies) -> Self {
        Self {
            submitter: JobSubmitter::new(backend.clone()),
            backend,
            policies,
        }
    }

    pub fn policies(&self) -> &StagePolicies {
        &self.policies
    }

    /// Execute `spec` on `initial_inputs`.
    ///
    /// Always returns a run in a terminal phase. Use
    /// [`PipelineRun::into_result`] to collapse it to the final locator or
    /// the error that ended it.
    pub async fn run(
        &self,
        spec: PipelineSpec,
        initial_inputs: Vec<MediaLocator>,
        ctx: &RunContext,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(spec, initial_inputs);
        let run_id = run.id();

        tracing::info!(
            run_id = %run_id,
            pipeline = %run.spec().display_name(),
            stages = run.stage_count(),
            "Starting pipeline run"
        );
        ctx.publish(EventPayload::RunStarted {
            run_id,
            stage_count: run.stage_count(),
        });

        match self.drive(&mut run, ctx).await {
            Ok(final_locator) => {
                tracing::info!(run_id = %run_id, locator = %final_locator, "Pipeline completed");
                ctx.publish(EventPayload::RunCompleted {
                    run_id,
                    final_locator: final_locator.clone(),
                });
                run.complete(final_locator);
            }
            Err(Error::Cancelled) => {
                tracing::info!(
                    run_id = %run_id,
                    stage_index = run.current_stage_index(),
                    "Pipeline cancelled"
                );
                ctx.publish(EventPayload::RunCancelled {
                    run_id,
                    stage_index: run.current_stage_index(),
                });
                run.cancel();
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, phase = %run.phase(), "Pipeline failed: {e}");
                ctx.publish(EventPayload::RunFailed {
                    run_id,
                    stage: e.stage(),
                    error: e.to_string(),
                });
                run.fail(e);
            }
        }

        tracing::debug!(
            run_id = %run_id,
            phase = %run.phase(),
            elapsed_ms = run.elapsed().map_or(0, |d| d.num_milliseconds()),
            "Run finished"
        );
        ctx.progress.send(&run.progress_update());
        run
    }

    async fn drive(&self, run: &mut PipelineRun, ctx: &RunContext) -> Result<MediaLocator> {
        run.spec().validate()?;

        let stage_count = run.stage_count();
        let mut request = run.spec().stages[0].with_inputs(run.initial_inputs().to_vec());

        for index in 0..stage_count {
            let kind = request.kind();
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }

            self.transition(run, ctx, Phase::Submitting { stage_index: index })?;
            let outcome = self.submitter.submit(&request).await;
            if ctx.is_cancelled() {
                tracing::debug!(stage = %kind, "Discarding submission result after cancellation");
                return Err(Error::Cancelled);
            }

            let status = match outcome? {
                SubmitOutcome::Finished(status) => {
                    ctx.publish(EventPayload::StageSubmitted {
                        run_id: run.id(),
                        stage_index: index,
                        stage: kind,
                        job_id: None,
                    });
                    run.record_status(status.clone(), 100);
                    status
                }
                SubmitOutcome::Accepted(job) => {
                    ctx.publish(EventPayload::StageSubmitted {
                        run_id: run.id(),
                        stage_index: index,
                        stage: kind,
                        job_id: Some(job.id.clone()),
                    });
                    run.record_job(job.clone());
                    self.transition(run, ctx, Phase::Polling { stage_index: index })?;
                    self.await_job(run, ctx, &job).await?
                }
            };

            if status.state == JobState::Failed {
                return Err(Error::stage_failed(
                    kind,
                    status
                        .message
                        .clone()
                        .unwrap_or_else(|| "backend reported failure".into()),
                ));
            }

            let locator = propagate::result_locator(&status, kind)?;
            ctx.publish(EventPayload::StageCompleted {
                run_id: run.id(),
                stage_index: index,
                stage: kind,
                result_locator: locator.clone(),
            });

            let next = index + 1;
            self.transition(run, ctx, Phase::Propagating { from: index, to: next })?;
            if next == stage_count {
                return Ok(locator);
            }

            let template = run.spec().stages[next].clone();
            request = propagate::propagate(&status, kind, &template)?;
        }

        Err(Error::Internal("pipeline ended without a final stage".into()))
    }

    /// Poll an accepted job until terminal, feeding every tick into the run.
    async fn await_job(
        &self,
        run: &mut PipelineRun,
        ctx: &RunContext,
        job: &JobDescriptor,
    ) -> Result<JobStatus> {
        let kind = job.kind;
        let poller = StatusPoller::new(kind, self.policies.for_kind(kind));
        let backend = self.backend.as_ref();
        let job_id = &job.id;
        let run_id = run.id();
        let index = run.current_stage_index();

        tracing::debug!(
            run_id = %run_id,
            stage = %kind,
            job_id = %job_id,
            interval_secs = poller.policy().interval.as_secs(),
            max_attempts = poller.policy().max_attempts,
            "Polling job"
        );

        poller
            .poll(
                move || backend.poll_stage(kind, job_id),
                &ctx.cancellation,
                |status, progress| {
                    run.record_status(status.clone(), progress);
                    ctx.progress.send(&run.progress_update());
                    ctx.publish(EventPayload::StageProgress {
                        run_id,
                        stage_index: index,
                        stage: kind,
                        progress,
                    });
                },
            )
            .await
    }

    fn transition(&self, run: &mut PipelineRun, ctx: &RunContext, next: Phase) -> Result<()> {
        run.enter(next)?;
        ctx.progress.send(&run.progress_update());
        Ok(())
    }
}
