//! HTTP implementation of the pipeline's [`StageBackend`] collaborator.
//!
//! [`StageBackend`]: adforge_pipeline::StageBackend

mod client;
mod types;

pub use client::HttpStageBackend;
