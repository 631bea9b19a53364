//! Handing one stage's output to the next stage.
//!
//! Both functions here are pure. A `Completed` status is not trusted to carry
//! its locator: the backend may update state and locator separately, so a
//! missing locator is a [`Error::Propagation`] rather than an empty input.

use adforge_core::{Error, JobState, JobStatus, MediaLocator, Result, StageKind, StageRequest};

/// Extract the result locator of a completed stage.
///
/// # Errors
///
/// [`Error::Propagation`] if `status` is not `Completed`, or is `Completed`
/// without a non-empty result locator.
pub fn result_locator(status: &JobStatus, stage: StageKind) -> Result<MediaLocator> {
    if status.state != JobState::Completed {
        return Err(Error::propagation(
            stage,
            format!("job {} is {}, not completed", status.id, status.state),
        ));
    }

    match &status.result_locator {
        Some(locator) if !locator.is_empty() => Ok(locator.clone()),
        _ => Err(Error::propagation(
            stage,
            format!("job {} completed without a result locator", status.id),
        )),
    }
}

/// Bind `next` to the output of the completed stage `stage`.
///
/// The returned request's `input_locators` is exactly `[result_locator]`.
pub fn propagate(status: &JobStatus, stage: StageKind, next: &StageRequest) -> Result<StageRequest> {
    let locator = result_locator(status, stage)?;
    tracing::debug!(
        from = %stage,
        to = %next.kind(),
        locator = %locator,
        "Propagating stage output"
    );
    Ok(next.with_inputs(vec![locator]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adforge_core::{CodecProfile, StageParams, TargetResolution};
    use assert_matches::assert_matches;

    fn transcode() -> StageRequest {
        StageRequest::template(StageParams::transcode(CodecProfile::Prores422Hq))
    }

    #[test]
    fn completed_status_becomes_single_input() {
        let status = JobStatus::completed("up-1", MediaLocator::from("https://cdn/u.mp4"));
        let next = propagate(&status, StageKind::SuperResolutionUpscale, &transcode()).unwrap();

        assert_eq!(next.input_locators, vec![MediaLocator::from("https://cdn/u.mp4")]);
        assert_eq!(next.params, transcode().params);
    }

    #[test]
    fn template_inputs_are_replaced() {
        let status = JobStatus::completed("c-1", MediaLocator::from("joined.mp4"));
        let template = StageRequest::template(StageParams::upscale(TargetResolution::Qhd1440))
            .with_inputs(vec![MediaLocator::from("stale.mp4")]);

        let next = propagate(&status, StageKind::Concatenate, &template).unwrap();
        assert_eq!(next.input_locators, vec![MediaLocator::from("joined.mp4")]);
    }

    #[test]
    fn completed_without_locator_is_rejected() {
        let mut status = JobStatus::completed("up-1", MediaLocator::from("x"));
        status.result_locator = None;

        let err = propagate(&status, StageKind::SuperResolutionUpscale, &transcode()).unwrap_err();
        assert_matches!(
            err,
            Error::Propagation { stage: StageKind::SuperResolutionUpscale, .. }
        );
    }

    #[test]
    fn blank_locator_is_rejected() {
        let status = JobStatus::completed("up-1", MediaLocator::from("   "));
        assert_matches!(
            result_locator(&status, StageKind::SuperResolutionUpscale),
            Err(Error::Propagation { .. })
        );
    }

    #[test]
    fn non_completed_status_is_rejected() {
        let status = JobStatus::processing("i-1", Some(50));
        let err = result_locator(&status, StageKind::FrameInterpolate).unwrap_err();
        assert!(err.to_string().contains("processing"), "got: {err}");
    }
}
