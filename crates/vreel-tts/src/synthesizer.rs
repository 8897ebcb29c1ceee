//! Speech synthesis adapter boundary.

use async_trait::async_trait;

use crate::error::{TtsError, TtsResult};

/// Turns text into an audio payload of unspecified format.
///
/// Callers must sniff or transcode the bytes; no container is promised.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> TtsResult<Vec<u8>>;
}

/// Backend used when synthesis is turned off or could not be constructed.
///
/// Every call fails, so callers fall back to their placeholder audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn synthesize(&self, _text: &str) -> TtsResult<Vec<u8>> {
        Err(TtsError::Disabled)
    }
}
