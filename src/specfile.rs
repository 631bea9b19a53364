//! Loading pipeline specs from TOML or JSON files.

use adforge_core::Error;
use adforge_pipeline::PipelineSpec;
use anyhow::{Context, Result};
use std::path::Path;

/// Load and validate a pipeline spec.
///
/// `.json` files are parsed as JSON, everything else as TOML. A spec without a
/// `name` is named after the file stem.
pub fn load_spec(path: &Path) -> Result<PipelineSpec> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Validation(format!("cannot read {}: {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut spec = if is_json {
        serde_json::from_str::<PipelineSpec>(&content)
            .map_err(|e| Error::Validation(e.to_string()))
    } else {
        toml::from_str::<PipelineSpec>(&content).map_err(|e| Error::Validation(e.to_string()))
    }
    .with_context(|| format!("Failed to parse pipeline spec: {:?}", path))?;

    if spec.name.is_none() {
        spec.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
    }

    spec.validate()
        .with_context(|| format!("Invalid pipeline spec: {:?}", path))?;
    Ok(spec)
}
