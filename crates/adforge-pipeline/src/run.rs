//! The mutable execution record of one pipeline run.
//!
//! A [`PipelineRun`] holds exactly one [`Phase`] at a time. Its mutators are
//! crate-private and enforce the run invariants:
//!
//! - the current stage index never decreases;
//! - `Completed`, `Failed` and `Cancelled` are final;
//! - the final locator is present if and only if the phase is `Completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use adforge_core::{
    Error, JobDescriptor, JobStatus, MediaLocator, Result, RunId, StageKind,
};

use crate::spec::PipelineSpec;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The single active phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Submitting { stage_index: usize },
    Polling { stage_index: usize },
    Propagating { from: usize, to: usize },
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }

    /// Stage the phase is working on, if it is tied to one.
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Phase::Submitting { stage_index } | Phase::Polling { stage_index } => {
                Some(*stage_index)
            }
            Phase::Propagating { from, .. } => Some(*from),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting { .. } => "submitting",
            Phase::Polling { .. } => "polling",
            Phase::Propagating { .. } => "propagating",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Submitting { stage_index } | Phase::Polling { stage_index } => {
                write!(f, "{}({stage_index})", self.name())
            }
            Phase::Propagating { from, to } => write!(f, "propagating({from}->{to})"),
            _ => f.write_str(self.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// StageRecord
// ---------------------------------------------------------------------------

/// What is known about one stage of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub kind: StageKind,
    /// Present once an asynchronous submission was accepted.
    pub job: Option<JobDescriptor>,
    /// Last status observed for the stage.
    pub status: Option<JobStatus>,
    /// Display progress, 0-100.
    pub progress: u8,
}

impl StageRecord {
    fn new(kind: StageKind) -> Self {
        Self {
            kind,
            job: None,
            status: None,
            progress: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressUpdate
// ---------------------------------------------------------------------------

/// Per-tick snapshot handed to the presentation layer.
///
/// Progress is per stage, never blended across stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub run_id: RunId,
    pub phase: Phase,
    pub stage_kind: Option<StageKind>,
    pub stage_index: usize,
    pub stage_count: usize,
    pub progress_percent: u8,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// Execution record of one run of a [`PipelineSpec`].
///
/// Created fresh by every orchestrator invocation and never persisted.
#[derive(Debug)]
pub struct PipelineRun {
    id: RunId,
    spec: PipelineSpec,
    initial_inputs: Vec<MediaLocator>,
    current_stage_index: usize,
    stages: Vec<StageRecord>,
    phase: Phase,
    final_locator: Option<MediaLocator>,
    error: Option<Error>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub(crate) fn new(spec: PipelineSpec, initial_inputs: Vec<MediaLocator>) -> Self {
        let stages = spec
            .stages
            .iter()
            .map(|s| StageRecord::new(s.kind()))
            .collect();
        Self {
            id: RunId::new(),
            spec,
            initial_inputs,
            current_stage_index: 0,
            stages,
            phase: Phase::Idle,
            final_locator: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn initial_inputs(&self) -> &[MediaLocator] {
        &self.initial_inputs
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_stage_index(&self) -> usize {
        self.current_stage_index
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn current_stage_kind(&self) -> Option<StageKind> {
        self.stages.get(self.current_stage_index).map(|s| s.kind)
    }

    /// Set if and only if the run completed.
    pub fn final_locator(&self) -> Option<&MediaLocator> {
        self.final_locator.as_ref()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Wall-clock time from creation to the terminal phase, once reached.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// Snapshot for the progress callback.
    pub fn progress_update(&self) -> ProgressUpdate {
        let progress_percent = match self.phase {
            Phase::Completed => 100,
            _ => self
                .stages
                .get(self.current_stage_index)
                .map_or(0, |s| s.progress),
        };
        ProgressUpdate {
            run_id: self.id,
            phase: self.phase,
            stage_kind: self.current_stage_kind(),
            stage_index: self.current_stage_index,
            stage_count: self.stages.len(),
            progress_percent,
            error_message: self.error.as_ref().map(Error::to_string),
        }
    }

    /// Consume the run into its single terminal result.
    pub fn into_result(self) -> Result<MediaLocator> {
        match self.phase {
            Phase::Completed => self
                .final_locator
                .ok_or_else(|| Error::Internal("completed run has no final locator".into())),
            Phase::Failed => Err(self
                .error
                .unwrap_or_else(|| Error::Internal("failed run has no error".into()))),
            Phase::Cancelled => Err(Error::Cancelled),
            phase => Err(Error::Internal(format!("run is still {phase}"))),
        }
    }

    // -- Transitions ---------------------------------------------------------

    /// Move to a non-terminal phase.
    pub(crate) fn enter(&mut self, next: Phase) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(Error::Internal(format!(
                "run {} is {} and cannot enter {next}",
                self.id, self.phase
            )));
        }
        if next.is_terminal() {
            return Err(Error::Internal(format!(
                "terminal phase {next} must be reached through complete/fail/cancel"
            )));
        }

        let index = match next {
            Phase::Idle => 0,
            Phase::Submitting { stage_index } | Phase::Polling { stage_index } => stage_index,
            Phase::Propagating { from, .. } => from,
            _ => self.current_stage_index,
        };
        if index < self.current_stage_index || index >= self.stages.len() {
            return Err(Error::Internal(format!(
                "run {} cannot move from stage {} to {next}",
                self.id, self.current_stage_index
            )));
        }

        tracing::debug!(run_id = %self.id, from = %self.phase, to = %next, "Phase transition");
        self.current_stage_index = index;
        self.phase = next;
        Ok(())
    }

    pub(crate) fn record_job(&mut self, job: JobDescriptor) {
        if let Some(stage) = self.stages.get_mut(self.current_stage_index) {
            stage.job = Some(job);
        }
    }

    pub(crate) fn record_status(&mut self, status: JobStatus, progress: u8) {
        if let Some(stage) = self.stages.get_mut(self.current_stage_index) {
            stage.progress = stage.progress.max(progress);
            stage.status = Some(status);
        }
    }

    pub(crate) fn complete(&mut self, final_locator: MediaLocator) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::Completed;
        self.final_locator = Some(final_locator);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: Error) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn cancel(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}
