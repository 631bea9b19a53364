//! Adforge - chained remote media pipelines for short ad videos.
//!
//! This library crate wires the pipeline core to a real transformation
//! backend and exposes the pieces the `adforge` binary and the integration
//! tests share.

pub mod backend;
pub mod config;
pub mod presets;
pub mod specfile;

pub use backend::HttpStageBackend;
pub use presets::Preset;
