//! Shared data models for the VReel assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Render configuration and canvas orientation presets
//! - Encoding parameters for the two FFmpeg passes
//! - Subtitle cues and the narration timeline

pub mod encoding;
pub mod render;
pub mod timeline;

// Re-export common types
pub use encoding::EncodingConfig;
pub use render::{ConfigError, Orientation, RenderConfig};
pub use timeline::{Cue, Timeline, EMPHASIS_CLOSE, EMPHASIS_OPEN};
