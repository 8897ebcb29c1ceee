//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use vreel_models::ConfigError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No source clips found in {0}")]
    NoClips(PathBuf),

    #[error("No script text found at {0}")]
    NoScript(PathBuf),

    #[error("Background music not found: {0}")]
    MissingMusic(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] vreel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Whether the run failed for lack of usable input rather than during
    /// processing. Input errors are raised before any engine invocation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WorkerError::NoClips(_)
                | WorkerError::NoScript(_)
                | WorkerError::MissingMusic(_)
                | WorkerError::InvalidConfig(_)
        )
    }

    /// Engine diagnostic output, when the failure came from FFmpeg.
    pub fn engine_output(&self) -> Option<&str> {
        match self {
            WorkerError::Media(e) => e.engine_output(),
            _ => None,
        }
    }
}
