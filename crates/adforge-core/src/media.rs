//! Media-stage domain model: locators, stage kinds and parameters, stage
//! requests, and the job descriptors and statuses the backend reports.
//!
//! Enums serialize in lowercase / snake_case and implement `Display` manually
//! for a consistent string representation in logs and error messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::JobId;

// ---------------------------------------------------------------------------
// MediaLocator
// ---------------------------------------------------------------------------

/// Opaque, immutable reference to a retrievable media artifact.
///
/// In practice this is a URL handed out by the transformation backend, but
/// nothing in the pipeline looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MediaLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Validation("media locator cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for MediaLocator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

/// The fixed set of remote transformation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    #[serde(rename = "concat")]
    Concatenate,
    #[serde(rename = "interpolate")]
    FrameInterpolate,
    #[serde(rename = "upscale")]
    SuperResolutionUpscale,
    #[serde(rename = "transcode")]
    CodecTranscode,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        Self::Concatenate,
        Self::FrameInterpolate,
        Self::SuperResolutionUpscale,
        Self::CodecTranscode,
    ];

    /// Short identifier used in URLs, config keys, and error prefixes.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Concatenate => "concat",
            Self::FrameInterpolate => "interpolate",
            Self::SuperResolutionUpscale => "upscale",
            Self::CodecTranscode => "transcode",
        }
    }

    /// Human-readable name for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Concatenate => "Concatenate",
            Self::FrameInterpolate => "Frame interpolation",
            Self::SuperResolutionUpscale => "Super-resolution upscale",
            Self::CodecTranscode => "Codec transcode",
        }
    }

    /// Whether the backend completes this stage within the submission round
    /// trip, so there is nothing to poll.
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::CodecTranscode)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for StageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Validation(format!("unknown stage kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Stage parameter enums
// ---------------------------------------------------------------------------

/// Transition inserted between concatenated clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    None,
    #[default]
    Fade,
    Dissolve,
    Wipe,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Fade => write!(f, "fade"),
            Self::Dissolve => write!(f, "dissolve"),
            Self::Wipe => write!(f, "wipe"),
        }
    }
}

/// Output resolution for super-resolution upscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetResolution {
    #[serde(rename = "1080p")]
    Fhd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[default]
    #[serde(rename = "4k")]
    Uhd4k,
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fhd1080 => write!(f, "1080p"),
            Self::Qhd1440 => write!(f, "1440p"),
            Self::Uhd4k => write!(f, "4k"),
        }
    }
}

/// Professional codec profile for the transcode stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodecProfile {
    #[serde(rename = "prores_proxy")]
    ProresProxy,
    #[serde(rename = "prores_lt")]
    ProresLt,
    #[serde(rename = "prores_422")]
    Prores422,
    #[default]
    #[serde(rename = "prores_422_hq")]
    Prores422Hq,
    #[serde(rename = "prores_4444")]
    Prores4444,
}

impl CodecProfile {
    /// File extension of the container the backend produces.
    pub fn extension(&self) -> &'static str {
        "mov"
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProresProxy => write!(f, "prores_proxy"),
            Self::ProresLt => write!(f, "prores_lt"),
            Self::Prores422 => write!(f, "prores_422"),
            Self::Prores422Hq => write!(f, "prores_422_hq"),
            Self::Prores4444 => write!(f, "prores_4444"),
        }
    }
}

fn default_transition_duration() -> f32 {
    1.0
}

fn default_model_id() -> String {
    "rife-v4".to_string()
}

fn default_target_fps() -> u32 {
    60
}

// ---------------------------------------------------------------------------
// StageParams / StageRequest
// ---------------------------------------------------------------------------

/// Stage-specific parameters. The variant determines the stage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StageParams {
    /// Join the input clips, in order, with the given transition.
    #[serde(rename = "concat")]
    Concatenate {
        #[serde(default)]
        transition: TransitionKind,
        #[serde(default = "default_transition_duration")]
        transition_duration_secs: f32,
    },
    #[serde(rename = "interpolate")]
    FrameInterpolate {
        #[serde(default = "default_model_id")]
        model_id: String,
        #[serde(default = "default_target_fps")]
        target_fps: u32,
    },
    #[serde(rename = "upscale")]
    SuperResolutionUpscale {
        #[serde(default)]
        target_resolution: TargetResolution,
        /// Upscale this artifact instead of the stage input. Only meaningful
        /// on the first stage of a pipeline.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_override: Option<MediaLocator>,
    },
    #[serde(rename = "transcode")]
    CodecTranscode {
        #[serde(default)]
        profile: CodecProfile,
    },
}

impl StageParams {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Concatenate { .. } => StageKind::Concatenate,
            Self::FrameInterpolate { .. } => StageKind::FrameInterpolate,
            Self::SuperResolutionUpscale { .. } => StageKind::SuperResolutionUpscale,
            Self::CodecTranscode { .. } => StageKind::CodecTranscode,
        }
    }

    pub fn concatenate(transition: TransitionKind, transition_duration_secs: f32) -> Self {
        Self::Concatenate {
            transition,
            transition_duration_secs,
        }
    }

    pub fn interpolate(model_id: impl Into<String>) -> Self {
        Self::FrameInterpolate {
            model_id: model_id.into(),
            target_fps: default_target_fps(),
        }
    }

    pub fn upscale(target_resolution: TargetResolution) -> Self {
        Self::SuperResolutionUpscale {
            target_resolution,
            source_override: None,
        }
    }

    pub fn transcode(profile: CodecProfile) -> Self {
        Self::CodecTranscode { profile }
    }

    /// Short human-readable summary, e.g. `upscale(4k)`.
    pub fn summary(&self) -> String {
        match self {
            Self::Concatenate {
                transition,
                transition_duration_secs,
            } => format!("concat({transition} {transition_duration_secs}s)"),
            Self::FrameInterpolate {
                model_id,
                target_fps,
            } => format!("interpolate({model_id} @ {target_fps}fps)"),
            Self::SuperResolutionUpscale {
                target_resolution,
                source_override,
            } => match source_override {
                Some(src) => format!("upscale({target_resolution}, source={src})"),
                None => format!("upscale({target_resolution})"),
            },
            Self::CodecTranscode { profile } => format!("transcode({profile})"),
        }
    }
}

/// A request to run one stage on the backend.
///
/// A request with empty `input_locators` is a *template*: pipeline specs hold
/// templates and the orchestrator fills in the inputs at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRequest {
    #[serde(flatten)]
    pub params: StageParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_locators: Vec<MediaLocator>,
}

impl StageRequest {
    pub fn template(params: StageParams) -> Self {
        Self {
            params,
            input_locators: Vec::new(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.params.kind()
    }

    pub fn is_template(&self) -> bool {
        self.input_locators.is_empty()
    }

    /// Return a copy of this template bound to the given inputs.
    #[must_use]
    pub fn with_inputs(&self, inputs: Vec<MediaLocator>) -> Self {
        Self {
            params: self.params.clone(),
            input_locators: inputs,
        }
    }

    /// Check that the request is well-formed before it is sent anywhere.
    ///
    /// Failures are reported as [`Error::Submission`] so that a malformed
    /// request and a remote rejection surface identically to the caller.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();

        if let Some(pos) = self.input_locators.iter().position(MediaLocator::is_empty) {
            return Err(Error::submission(
                kind,
                format!("input locator #{pos} is empty"),
            ));
        }

        match &self.params {
            StageParams::Concatenate {
                transition,
                transition_duration_secs,
            } => {
                if self.input_locators.len() < 2 {
                    return Err(Error::submission(
                        kind,
                        format!(
                            "concatenation needs at least 2 clips, got {}",
                            self.input_locators.len()
                        ),
                    ));
                }
                if !transition_duration_secs.is_finite() || *transition_duration_secs < 0.0 {
                    return Err(Error::submission(
                        kind,
                        format!("invalid transition duration {transition_duration_secs}"),
                    ));
                }
                if *transition != TransitionKind::None && *transition_duration_secs == 0.0 {
                    return Err(Error::submission(
                        kind,
                        format!("transition '{transition}' needs a non-zero duration"),
                    ));
                }
            }
            StageParams::FrameInterpolate {
                model_id,
                target_fps,
            } => {
                if model_id.trim().is_empty() {
                    return Err(Error::submission(kind, "interpolation model id is empty"));
                }
                if *target_fps == 0 {
                    return Err(Error::submission(kind, "target fps must be positive"));
                }
                self.require_single_input()?;
            }
            StageParams::SuperResolutionUpscale {
                source_override, ..
            } => {
                if let Some(src) = source_override {
                    if src.is_empty() {
                        return Err(Error::submission(kind, "source override is empty"));
                    }
                    if self.input_locators.len() > 1 {
                        return Err(Error::submission(
                            kind,
                            "upscale takes a single source",
                        ));
                    }
                } else {
                    self.require_single_input()?;
                }
            }
            StageParams::CodecTranscode { .. } => self.require_single_input()?,
        }

        Ok(())
    }

    /// The locator this stage actually operates on, honouring an upscale
    /// source override.
    pub fn primary_source(&self) -> Option<&MediaLocator> {
        match &self.params {
            StageParams::SuperResolutionUpscale {
                source_override: Some(src),
                ..
            } => Some(src),
            _ => self.input_locators.first(),
        }
    }

    fn require_single_input(&self) -> Result<()> {
        match self.input_locators.len() {
            1 => Ok(()),
            n => Err(Error::submission(
                self.kind(),
                format!("expected exactly 1 input locator, got {n}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Handle to an asynchronous remote job, returned on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub kind: StageKind,
    pub created_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(id: impl Into<JobId>, kind: StageKind) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: Utc::now(),
        }
    }
}

/// Remote job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// `Completed` and `Failed` are terminal: no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time status of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    /// Percentage 0-100, when the backend reports one.
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub result_locator: Option<MediaLocator>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobStatus {
    pub fn pending(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Pending,
            progress: None,
            result_locator: None,
            message: None,
        }
    }

    pub fn processing(id: impl Into<JobId>, progress: Option<u8>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Processing,
            progress: progress.map(|p| p.min(100)),
            result_locator: None,
            message: None,
        }
    }

    pub fn completed(id: impl Into<JobId>, locator: MediaLocator) -> Self {
        Self {
            id: id.into(),
            state: JobState::Completed,
            progress: Some(100),
            result_locator: Some(locator),
            message: None,
        }
    }

    pub fn failed(id: impl Into<JobId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Failed,
            progress: None,
            result_locator: None,
            message: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// What a stage submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend accepted an asynchronous job that must be polled.
    Accepted(JobDescriptor),
    /// The backend finished the work within the submission round trip.
    Finished(JobStatus),
}
