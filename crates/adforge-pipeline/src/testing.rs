//! Scripted in-memory backend shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;

use adforge_core::{
    Error, JobDescriptor, JobId, JobStatus, MediaLocator, Result, StageKind, StageRequest,
    SubmitOutcome,
};

use crate::backend::{ByteStream, StageBackend};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Submit(StageRequest),
    Poll(StageKind, JobId),
    Fetch(MediaLocator),
}

/// What a scripted poll returns.
#[derive(Debug, Clone)]
pub enum PollStep {
    Status(JobStatus),
    Transient(String),
}

/// What a scripted submission returns.
#[derive(Debug, Clone)]
pub enum SubmitStep {
    Accept(JobId),
    Finish(JobStatus),
    Reject(String),
}

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct Script {
    submits: HashMap<StageKind, VecDeque<SubmitStep>>,
    polls: HashMap<JobId, VecDeque<PollStep>>,
    last_poll: HashMap<JobId, PollStep>,
    artifacts: HashMap<MediaLocator, Vec<Bytes>>,
    fetch_failures: usize,
}

/// Backend whose responses are scripted per stage kind and job id.
///
/// When a job's poll script runs dry the last step repeats forever, so a
/// single `Processing` step models a job that never finishes.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    on_submit: Mutex<Option<CallHook>>,
    on_poll: Mutex<Option<CallHook>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(&self, kind: StageKind, step: SubmitStep) -> &Self {
        self.script
            .lock()
            .submits
            .entry(kind)
            .or_default()
            .push_back(step);
        self
    }

    pub fn on_poll(&self, job: &str, steps: impl IntoIterator<Item = PollStep>) -> &Self {
        self.script
            .lock()
            .polls
            .entry(JobId::from(job))
            .or_default()
            .extend(steps);
        self
    }

    pub fn with_artifact(&self, locator: &str, chunks: &[&[u8]]) -> &Self {
        self.script.lock().artifacts.insert(
            MediaLocator::from(locator),
            chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
        );
        self
    }

    /// Make the next `n` fetches fail before any bytes are sent.
    pub fn fail_fetches(&self, n: usize) -> &Self {
        self.script.lock().fetch_failures = n;
        self
    }

    /// Run `hook` with the 1-based submit count while every submit call is
    /// still in flight, before its scripted response is returned.
    pub fn hook_submits(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_submit.lock() = Some(Box::new(hook));
    }

    /// Run `hook` with the 1-based poll count after every poll call.
    pub fn hook_polls(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_poll.lock() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn submits(&self) -> Vec<StageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Poll(..)))
            .count()
    }
}

#[async_trait]
impl StageBackend for ScriptedBackend {
    async fn submit_stage(&self, request: &StageRequest) -> Result<SubmitOutcome> {
        let count = {
            let mut calls = self.calls.lock();
            calls.push(Call::Submit(request.clone()));
            calls.iter().filter(|c| matches!(c, Call::Submit(_))).count()
        };

        let kind = request.kind();
        let step = self
            .script
            .lock()
            .submits
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);

        if let Some(hook) = self.on_submit.lock().as_ref() {
            hook(count);
        }

        match step {
            Some(SubmitStep::Accept(id)) => Ok(SubmitOutcome::Accepted(JobDescriptor::new(id, kind))),
            Some(SubmitStep::Finish(status)) => Ok(SubmitOutcome::Finished(status)),
            Some(SubmitStep::Reject(msg)) => Err(Error::submission(kind, msg)),
            None => Err(Error::submission(kind, "no scripted response")),
        }
    }

    async fn poll_stage(&self, kind: StageKind, job_id: &JobId) -> Result<JobStatus> {
        let count = {
            let mut calls = self.calls.lock();
            calls.push(Call::Poll(kind, job_id.clone()));
            calls.iter().filter(|c| matches!(c, Call::Poll(..))).count()
        };

        let step = {
            let mut script = self.script.lock();
            let next = script.polls.get_mut(job_id).and_then(VecDeque::pop_front);
            match next {
                Some(step) => {
                    script.last_poll.insert(job_id.clone(), step.clone());
                    Some(step)
                }
                None => script.last_poll.get(job_id).cloned(),
            }
        };

        if let Some(hook) = self.on_poll.lock().as_ref() {
            hook(count);
        }

        match step {
            Some(PollStep::Status(status)) => Ok(status),
            Some(PollStep::Transient(msg)) => Err(Error::poll(kind, msg)),
            None => Err(Error::poll(kind, format!("unknown job {job_id}"))),
        }
    }

    async fn fetch_artifact(&self, locator: &MediaLocator) -> Result<ByteStream> {
        self.calls
            .lock()
            .push(Call::Fetch(locator.clone()));

        let mut script = self.script.lock();
        if script.fetch_failures > 0 {
            script.fetch_failures -= 1;
            return Err(Error::download(locator, "connection reset"));
        }
        let chunks = script
            .artifacts
            .get(locator)
            .cloned()
            .ok_or_else(|| Error::download(locator, "HTTP 404 Not Found"))?;
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

pub fn loc(s: &str) -> MediaLocator {
    MediaLocator::from(s)
}

pub fn processing(job: &str, progress: Option<u8>) -> PollStep {
    PollStep::Status(JobStatus::processing(job, progress))
}

pub fn completed(job: &str, locator: &str) -> PollStep {
    PollStep::Status(JobStatus::completed(job, loc(locator)))
}

pub fn failed(job: &str, message: &str) -> PollStep {
    PollStep::Status(JobStatus::failed(job, message))
}
