//! Declarative pipeline definition.

use serde::{Deserialize, Serialize};

use adforge_core::{Error, Result, StageKind, StageParams, StageRequest};

/// Ordered list of stage templates for one run.
///
/// Specs are plain data: they can be built in code, taken from a preset, or
/// deserialized from a TOML/JSON file.
///
/// ```toml
/// name = "upscale-prores"
///
/// [[stages]]
/// kind = "upscale"
/// target_resolution = "4k"
///
/// [[stages]]
/// kind = "transcode"
/// profile = "prores_422_hq"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stages: Vec<StageRequest>,
}

impl PipelineSpec {
    pub fn new(stages: Vec<StageRequest>) -> Self {
        Self { name: None, stages }
    }

    pub fn named(name: impl Into<String>, stages: Vec<StageRequest>) -> Self {
        Self {
            name: Some(name.into()),
            stages,
        }
    }

    /// Build a spec from bare parameter lists.
    pub fn from_params(params: impl IntoIterator<Item = StageParams>) -> Self {
        Self::new(params.into_iter().map(StageRequest::template).collect())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(StageRequest::kind).collect()
    }

    /// Name for logs: the explicit name, or the stage slugs joined by `+`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .stages
                .iter()
                .map(|s| s.kind().slug())
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    /// Check the structural rules a spec must satisfy before a run starts.
    ///
    /// Per-stage parameters (clip counts, fps and so on) are checked later,
    /// at submission, once inputs are bound.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::Validation("pipeline has no stages".into()));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.is_template() {
                return Err(Error::Validation(format!(
                    "stage {index} ({}) must not declare input locators",
                    stage.kind()
                )));
            }
            if index == 0 {
                continue;
            }
            match &stage.params {
                StageParams::Concatenate { .. } => {
                    return Err(Error::Validation(format!(
                        "stage {index}: concat can only be the first stage"
                    )));
                }
                StageParams::SuperResolutionUpscale {
                    source_override: Some(_),
                    ..
                } => {
                    return Err(Error::Validation(format!(
                        "stage {index}: upscale source override is only allowed on the first stage"
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
