use adforge_core::{JobState, MediaLocator, StageParams, StageRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/{stage}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitBody<'a> {
    pub inputs: &'a [MediaLocator],
    #[serde(flatten)]
    pub params: WireParams<'a>,
}

impl<'a> SubmitBody<'a> {
    pub fn new(request: &'a StageRequest) -> Self {
        Self {
            inputs: &request.input_locators,
            params: WireParams::from(&request.params),
        }
    }
}

/// Stage parameters as the backend spells them.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum WireParams<'a> {
    #[serde(rename_all = "camelCase")]
    Concatenate {
        transition: &'a adforge_core::TransitionKind,
        transition_duration_secs: f32,
    },
    #[serde(rename_all = "camelCase")]
    Interpolate { model_id: &'a str, target_fps: u32 },
    #[serde(rename_all = "camelCase")]
    Upscale {
        target_resolution: &'a adforge_core::TargetResolution,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_override: Option<&'a MediaLocator>,
    },
    #[serde(rename_all = "camelCase")]
    Transcode { profile: &'a adforge_core::CodecProfile },
}

impl<'a> From<&'a StageParams> for WireParams<'a> {
    fn from(params: &'a StageParams) -> Self {
        match params {
            StageParams::Concatenate {
                transition,
                transition_duration_secs,
            } => WireParams::Concatenate {
                transition,
                transition_duration_secs: *transition_duration_secs,
            },
            StageParams::FrameInterpolate {
                model_id,
                target_fps,
            } => WireParams::Interpolate {
                model_id,
                target_fps: *target_fps,
            },
            StageParams::SuperResolutionUpscale {
                target_resolution,
                source_override,
            } => WireParams::Upscale {
                target_resolution,
                source_override: source_override.as_ref(),
            },
            StageParams::CodecTranscode { profile } => WireParams::Transcode { profile },
        }
    }
}

/// Response of `POST /v1/{stage}`.
///
/// Asynchronous stages answer with a `jobId`; synchronous ones with a terminal
/// `status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponse {
    pub job_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: Option<JobState>,
    pub result_url: Option<String>,
    pub message: Option<String>,
}

/// Response of `GET /v1/{stage}/{jobId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResponse {
    pub status: JobState,
    pub progress: Option<f64>,
    pub result_url: Option<String>,
    pub message: Option<String>,
}

/// Clamp a reported progress number to a whole percentage.
pub(crate) fn clamp_progress(progress: Option<f64>) -> Option<u8> {
    progress
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8)
}
