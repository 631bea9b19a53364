use std::time::Duration;

use adforge_core::config::BackendConfig;
use adforge_core::{
    Error, JobDescriptor, JobId, JobState, JobStatus, MediaLocator, Result, StageKind,
    StageRequest, SubmitOutcome,
};
use adforge_pipeline::{ByteStream, StageBackend};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};

use super::types::{clamp_progress, StatusResponse, SubmitBody, SubmitResponse};

/// Talks to the transformation backend over its JSON API.
///
/// - `POST {base}/v1/{stage}` starts a stage.
/// - `GET {base}/v1/{stage}/{job}` reports a job's status.
/// - Artifacts are plain `GET`s on their locator.
#[derive(Debug, Clone)]
pub struct HttpStageBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpStageBackend {
    pub fn new(config: &BackendConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeouts: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stage_url(&self, kind: StageKind) -> String {
        format!("{}/v1/{}", self.base_url, kind.slug())
    }

    /// Absolute locators are used as-is; anything else is a path on the
    /// backend.
    fn artifact_url(&self, locator: &MediaLocator) -> String {
        let raw = locator.as_str();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("{}/{}", self.base_url, raw.trim_start_matches('/'))
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// `HTTP {status}: {body}` for a non-success response.
async fn status_error(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    }
}

#[async_trait::async_trait]
impl StageBackend for HttpStageBackend {
    async fn submit_stage(&self, request: &StageRequest) -> Result<SubmitOutcome> {
        let kind = request.kind();
        let response = self
            .authorized(self.client.post(self.stage_url(kind)))
            .json(&SubmitBody::new(request))
            .send()
            .await
            .map_err(|e| Error::submission(kind, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::submission(kind, status_error(response).await));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Error::submission(kind, format!("invalid response: {e}")))?;

        match (body.status, body.job_id) {
            (Some(JobState::Completed), job_id) => Ok(SubmitOutcome::Finished(JobStatus {
                id: JobId::from(job_id.unwrap_or_else(|| format!("{}-sync", kind.slug()))),
                state: JobState::Completed,
                progress: Some(100),
                result_locator: body.result_url.map(MediaLocator::new),
                message: body.message,
            })),
            (Some(JobState::Failed), _) => Err(Error::submission(
                kind,
                body.message
                    .unwrap_or_else(|| "backend reported failure".into()),
            )),
            (_, Some(job_id)) => {
                let mut job = JobDescriptor::new(job_id, kind);
                if let Some(created_at) = body.created_at {
                    job.created_at = created_at;
                }
                Ok(SubmitOutcome::Accepted(job))
            }
            (_, None) => Err(Error::submission(
                kind,
                "response carried neither a job id nor a terminal status",
            )),
        }
    }

    async fn poll_stage(&self, kind: StageKind, job_id: &JobId) -> Result<JobStatus> {
        let url = format!("{}/{}", self.stage_url(kind), job_id);
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| Error::poll(kind, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::poll(kind, status_error(response).await));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| Error::poll(kind, format!("invalid response: {e}")))?;

        Ok(JobStatus {
            id: job_id.clone(),
            state: body.status,
            progress: clamp_progress(body.progress),
            result_locator: body.result_url.map(MediaLocator::new),
            message: body.message,
        })
    }

    async fn fetch_artifact(&self, locator: &MediaLocator) -> Result<ByteStream> {
        let response = self
            .authorized(self.client.get(self.artifact_url(locator)))
            .send()
            .await
            .map_err(|e| Error::download(locator, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::download(locator, status_error(response).await));
        }

        let owned = locator.clone();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| Error::download(&owned, format!("transfer interrupted: {e}")))
        });
        Ok(Box::pin(stream))
    }
}
