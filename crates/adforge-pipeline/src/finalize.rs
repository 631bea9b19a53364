//! Retrieving and persisting the final artifact of a completed run.
//!
//! This is the only part of the pipeline that touches durable local state.
//! A failure here leaves the remote artifact intact: fetching the same
//! locator again is always safe and never re-runs a stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use adforge_core::events::{EventBus, EventPayload};
use adforge_core::{Error, MediaLocator, Result, StageParams};

use crate::backend::StageBackend;
use crate::run::{Phase, PipelineRun};

const DEFAULT_EXTENSION: &str = "mp4";

/// A persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub locator: MediaLocator,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Streams final artifacts to a local directory.
pub struct DownloadFinalizer {
    backend: Arc<dyn StageBackend>,
    output_dir: PathBuf,
    file_prefix: String,
    events: Option<Arc<EventBus>>,
}

impl DownloadFinalizer {
    pub fn new(backend: Arc<dyn StageBackend>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_dir: output_dir.into(),
            file_prefix: "adforge".into(),
            events: None,
        }
    }

    /// Builder: set the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Builder: attach an event bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Download the final artifact of `run`.
    ///
    /// The run is only read, never modified.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if the run did not complete; [`Error::Download`]
    /// if the transfer or the local write fails.
    pub async fn finalize(&self, run: &PipelineRun) -> Result<DownloadedArtifact> {
        let locator = match (run.phase(), run.final_locator()) {
            (Phase::Completed, Some(locator)) => locator,
            (phase, _) => {
                return Err(Error::Validation(format!(
                    "run {} is {phase}; only completed runs can be downloaded",
                    run.id()
                )));
            }
        };
        let last_stage = run.spec().stages.last().map(|s| &s.params);
        self.fetch(locator, last_stage).await
    }

    /// Download `locator` directly.
    ///
    /// `stage` describes the stage that produced the artifact, if known, and
    /// only influences the file name.
    pub async fn fetch(
        &self,
        locator: &MediaLocator,
        stage: Option<&StageParams>,
    ) -> Result<DownloadedArtifact> {
        let path = self.output_dir.join(artifact_file_name(&self.file_prefix, locator, stage));

        match self.transfer(locator, &path).await {
            Ok(bytes) => {
                tracing::info!(locator = %locator, path = %path.display(), bytes, "Artifact saved");
                self.publish(EventPayload::DownloadCompleted {
                    locator: locator.clone(),
                    path: path.clone(),
                    bytes,
                });
                Ok(DownloadedArtifact {
                    locator: locator.clone(),
                    path,
                    bytes,
                })
            }
            Err(e) => {
                tracing::error!(locator = %locator, "Download failed: {e}");
                self.publish(EventPayload::DownloadFailed {
                    locator: locator.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn transfer(&self, locator: &MediaLocator, dest: &Path) -> Result<u64> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                Error::download(
                    locator,
                    format!("cannot create {}: {e}", self.output_dir.display()),
                )
            })?;

        let part = dest.with_extension(part_extension(dest));
        let result = write_stream(self.backend.as_ref(), locator, &part).await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(Error::download(
                locator,
                format!("cannot move into {}: {e}", dest.display()),
            ));
        }

        Ok(bytes)
    }

    fn publish(&self, payload: EventPayload) {
        if let Some(bus) = &self.events {
            bus.broadcast(payload);
        }
    }
}

async fn write_stream(
    backend: &dyn StageBackend,
    locator: &MediaLocator,
    part: &Path,
) -> Result<u64> {
    let mut stream = backend.fetch_artifact(locator).await?;
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| Error::download(locator, format!("cannot create {}: {e}", part.display())))?;

    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| match e {
            Error::Download { .. } => e,
            other => Error::download(locator, other.message()),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::download(locator, format!("write failed: {e}")))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| Error::download(locator, format!("flush failed: {e}")))?;
    Ok(written)
}

fn part_extension(dest: &Path) -> String {
    match dest.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.part"),
        None => "part".into(),
    }
}

/// `{prefix}_{stage}_{timestamp}_{short-uuid}.{ext}`
fn artifact_file_name(
    prefix: &str,
    locator: &MediaLocator,
    stage: Option<&StageParams>,
) -> String {
    let stage_slug = stage.map_or("final", |p| p.kind().slug());
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    let token = Uuid::new_v4().simple().to_string();
    let extension = artifact_extension(locator, stage);
    format!("{prefix}_{stage_slug}_{timestamp}_{}.{extension}", &token[..8])
}

fn artifact_extension(locator: &MediaLocator, stage: Option<&StageParams>) -> String {
    if let Some(StageParams::CodecTranscode { profile }) = stage {
        return profile.extension().to_string();
    }

    // Last path segment, ignoring query string and fragment.
    let path = locator
        .as_str()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.into(),
    }
}
