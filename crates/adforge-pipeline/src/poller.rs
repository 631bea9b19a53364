//! Observing a remote job until it reaches a terminal state.
//!
//! [`StatusPoller`] replaces per-call-site timer bookkeeping with one loop
//! parameterized by a query function and a [`PollPolicy`] (interval, attempt
//! budget, progress placeholder). Each wait between ticks is a suspension
//! point that also watches the run's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use adforge_core::config::{PollCadence, PollingConfig};
use adforge_core::{Error, JobState, JobStatus, Result, StageKind};

// ---------------------------------------------------------------------------
// PollPolicy
// ---------------------------------------------------------------------------

/// Cadence and budget for polling one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Synthesized progress added per attempt when the backend omits one.
    pub placeholder_step: u8,
    /// Synthesized progress never exceeds this.
    pub placeholder_cap: u8,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            placeholder_step: 3,
            placeholder_cap: 90,
        }
    }

    /// Wall-clock budget: attempts x interval, saturating.
    pub fn budget(&self) -> Duration {
        self.interval
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }
}

impl From<PollCadence> for PollPolicy {
    fn from(cadence: PollCadence) -> Self {
        Self {
            interval: cadence.interval(),
            max_attempts: cadence.max_attempts,
            placeholder_step: cadence.placeholder_step,
            placeholder_cap: cadence.placeholder_cap.min(99),
        }
    }
}

/// Poll policy per stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicies {
    pub concatenate: PollPolicy,
    pub interpolate: PollPolicy,
    pub upscale: PollPolicy,
    /// Used if a normally synchronous stage hands back a job to poll.
    pub fallback: PollPolicy,
}

impl StagePolicies {
    /// The same policy for every stage kind.
    pub fn uniform(policy: PollPolicy) -> Self {
        Self {
            concatenate: policy,
            interpolate: policy,
            upscale: policy,
            fallback: policy,
        }
    }

    pub fn for_kind(&self, kind: StageKind) -> PollPolicy {
        match kind {
            StageKind::Concatenate => self.concatenate,
            StageKind::FrameInterpolate => self.interpolate,
            StageKind::SuperResolutionUpscale => self.upscale,
            StageKind::CodecTranscode => self.fallback,
        }
    }
}

impl From<&PollingConfig> for StagePolicies {
    fn from(config: &PollingConfig) -> Self {
        Self {
            concatenate: config.concatenate.into(),
            interpolate: config.interpolate.into(),
            upscale: config.upscale.into(),
            fallback: PollCadence::default().into(),
        }
    }
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Progress placeholder
// ---------------------------------------------------------------------------

/// Turns raw statuses into a monotonically non-decreasing percentage.
///
/// Backend-reported progress is used when present. Otherwise a placeholder of
/// `min(attempt * step, cap)` stands in. The value never goes backwards and
/// only reaches 100 on completion.
#[derive(Debug, Clone)]
struct ProgressEstimate {
    step: u8,
    cap: u8,
    last: u8,
}

impl ProgressEstimate {
    fn new(policy: &PollPolicy) -> Self {
        Self {
            step: policy.placeholder_step,
            cap: policy.placeholder_cap.min(99),
            last: 0,
        }
    }

    fn observe(&mut self, attempt: u32, status: &JobStatus) -> u8 {
        let value = match (status.state, status.progress) {
            (JobState::Completed, _) => 100,
            (JobState::Failed, _) => self.last,
            // 100 is reserved for the terminal Completed state.
            (_, Some(reported)) => reported.min(99),
            (_, None) => {
                let synthesized = attempt.saturating_mul(u32::from(self.step));
                synthesized.min(u32::from(self.cap)) as u8
            }
        };
        self.last = self.last.max(value);
        self.last
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

/// Repeatedly queries a job until it is terminal or the budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    stage: StageKind,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(stage: StageKind, policy: PollPolicy) -> Self {
        Self { stage, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll until the job is terminal.
    ///
    /// Each attempt first waits one interval, then issues one query. Transient
    /// query failures ([`Error::Poll`]) consume an attempt and are otherwise
    /// ignored. `on_tick` receives every status the backend returns together
    /// with the progress percentage to display.
    ///
    /// Returns the terminal status, `Completed` or `Failed` alike; mapping a
    /// failed job to an error is the caller's business.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] after `max_attempts` queries without a terminal
    ///   state. Exactly `max_attempts` queries are issued.
    /// - [`Error::Cancelled`] once `cancel` fires. A query already in flight
    ///   is allowed to finish but its result is discarded.
    /// - Any non-transient error returned by `query`.
    pub async fn poll<F, Fut, T>(
        &self,
        mut query: F,
        cancel: &CancellationToken,
        mut on_tick: T,
    ) -> Result<JobStatus>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobStatus>>,
        T: FnMut(&JobStatus, u8),
    {
        let started = Instant::now();
        let mut estimate = ProgressEstimate::new(&self.policy);

        for attempt in 1..=self.policy.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            let result = query().await;

            if cancel.is_cancelled() {
                tracing::debug!(stage = %self.stage, attempt, "Discarding poll result after cancellation");
                return Err(Error::Cancelled);
            }

            match result {
                Ok(status) => {
                    let progress = estimate.observe(attempt, &status);
                    tracing::trace!(
                        stage = %self.stage,
                        attempt,
                        state = %status.state,
                        progress,
                        "Poll tick"
                    );
                    on_tick(&status, progress);
                    if status.is_terminal() {
                        return Ok(status);
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        stage = %self.stage,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "Status query failed, retrying: {}",
                        e.message()
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Timeout {
            stage: self.stage,
            attempts: self.policy.max_attempts,
            waited: started.elapsed(),
        })
    }
}
