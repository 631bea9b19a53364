//! HTTP backend tests
//!
//! Exercises `HttpStageBackend` against a mock transformation service.

use adforge::HttpStageBackend;
use adforge_core::config::BackendConfig;
use adforge_core::{
    CodecProfile, Error, JobState, MediaLocator, StageKind, StageParams, StageRequest,
    SubmitOutcome, TargetResolution,
};
use adforge_pipeline::StageBackend;
use assert_matches::assert_matches;
use futures::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer, api_key: Option<&str>) -> HttpStageBackend {
    HttpStageBackend::new(&BackendConfig {
        url: server.uri(),
        api_key: api_key.map(str::to_string),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
    })
}

fn upscale_request() -> StageRequest {
    StageRequest::template(StageParams::upscale(TargetResolution::Uhd4k))
        .with_inputs(vec![MediaLocator::from("https://cdn.example/spot.mp4")])
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_async_stage_returns_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/upscale"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_partial_json(json!({
            "inputs": ["https://cdn.example/spot.mp4"],
            "targetResolution": "4k",
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "jobId": "up-42",
            "createdAt": "2026-03-01T10:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server, Some("s3cret"));
    let outcome = backend.submit_stage(&upscale_request()).await.unwrap();

    assert_matches!(outcome, SubmitOutcome::Accepted(job) => {
        assert_eq!(job.id.as_str(), "up-42");
        assert_eq!(job.kind, StageKind::SuperResolutionUpscale);
        assert_eq!(job.created_at.to_rfc3339(), "2026-03-01T10:00:00+00:00");
    });
}

#[tokio::test]
async fn submit_sync_stage_returns_finished_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transcode"))
        .and(body_partial_json(json!({ "profile": "prores_422_hq" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "resultUrl": "https://cdn.example/out.mov",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, None);
    let request = StageRequest::template(StageParams::transcode(CodecProfile::Prores422Hq))
        .with_inputs(vec![MediaLocator::from("https://cdn.example/up.mp4")]);
    let outcome = backend.submit_stage(&request).await.unwrap();

    assert_matches!(outcome, SubmitOutcome::Finished(status) => {
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.id.as_str(), "transcode-sync");
        assert_eq!(
            status.result_locator,
            Some(MediaLocator::from("https://cdn.example/out.mov"))
        );
    });
}

#[tokio::test]
async fn submit_reported_failure_is_submission_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/upscale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "message": "source is not a video",
        })))
        .mount(&server)
        .await;

    let err = backend_for(&server, None)
        .submit_stage(&upscale_request())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Submission { stage: StageKind::SuperResolutionUpscale, message } => {
        assert_eq!(message, "source is not a video");
    });
}

#[tokio::test]
async fn submit_http_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/upscale"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unsupported container"))
        .mount(&server)
        .await;

    let err = backend_for(&server, None)
        .submit_stage(&upscale_request())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Submission { message, .. } => {
        assert!(message.contains("422"), "got: {message}");
        assert!(message.contains("unsupported container"), "got: {message}");
    });
}

#[tokio::test]
async fn submit_without_job_or_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/upscale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = backend_for(&server, None)
        .submit_stage(&upscale_request())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Submission { .. });
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_parses_and_clamps_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/interpolate/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing",
            "progress": 140.2,
        })))
        .mount(&server)
        .await;

    let status = backend_for(&server, None)
        .poll_stage(StageKind::FrameInterpolate, &"job-7".into())
        .await
        .unwrap();
    assert_eq!(status.state, JobState::Processing);
    assert_eq!(status.progress, Some(100));
    assert_eq!(status.id.as_str(), "job-7");
}

#[tokio::test]
async fn poll_completed_carries_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/concat/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "resultUrl": "/files/joined.mp4",
        })))
        .mount(&server)
        .await;

    let status = backend_for(&server, None)
        .poll_stage(StageKind::Concatenate, &"job-1".into())
        .await
        .unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(
        status.result_locator,
        Some(MediaLocator::from("/files/joined.mp4"))
    );
}

#[tokio::test]
async fn poll_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/upscale/job-9"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend_for(&server, None)
        .poll_stage(StageKind::SuperResolutionUpscale, &"job-9".into())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Poll { .. });
    assert!(err.is_transient());
}

// ---------------------------------------------------------------------------
// Artifact fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_streams_relative_locator_from_base() {
    let server = MockServer::start().await;
    let payload = vec![7u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/files/final.mov"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let stream = backend_for(&server, None)
        .fetch_artifact(&MediaLocator::from("/files/final.mov"))
        .await
        .unwrap();
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    let received: Vec<u8> = chunks.concat();
    assert_eq!(received, payload);
}

#[tokio::test]
async fn fetch_missing_artifact_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let locator = MediaLocator::new(format!("{}/files/gone.mp4", server.uri()));
    let result = backend_for(&server, None).fetch_artifact(&locator).await;
    let err = match result {
        Ok(_) => panic!("expected a download error"),
        Err(e) => e,
    };
    assert_matches!(err, Error::Download { ref locator, .. } if locator.ends_with("gone.mp4"));
    assert!(err.is_retriable_download());
}
