//! adforge-core: shared types, IDs, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for the other adforge crates,
//! providing the media-stage domain model (locators, stage kinds, requests,
//! job descriptors and statuses), a unified error type, typed identifiers,
//! application configuration, and a broadcast event bus for run lifecycle
//! events.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
