//! TTS client error types.

use thiserror::Error;

pub type TtsResult<T> = Result<T, TtsError>;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Speech synthesis is disabled")]
    Disabled,

    #[error("Invalid TTS configuration: {0}")]
    Config(String),

    #[error("TTS service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS service rejected the request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("TTS service returned empty audio")]
    EmptyAudio,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl TtsError {
    /// Whether the service itself was reached and answered.
    pub fn is_service_reply(&self) -> bool {
        matches!(
            self,
            TtsError::Status { .. }
                | TtsError::Rejected { .. }
                | TtsError::InvalidResponse(_)
                | TtsError::EmptyAudio
        )
    }
}
