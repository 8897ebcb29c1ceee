//! Short-form video assembly pipeline.
//!
//! This crate wires script text, speech synthesis and the FFmpeg graph
//! builders into one run:
//! - Sentence segmentation and keyword emphasis
//! - Narration timing with placeholder fallbacks
//! - Clip and script discovery
//! - The staged pipeline and a single-run background executor

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod narration;
pub mod pipeline;
pub mod sources;
pub mod text;

use std::sync::Arc;

use tracing::{info, warn};
use vreel_tts::{DisabledSynthesizer, HttpTtsClient, SpeechSynthesizer};

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{RunExecutor, RunHandle, RunStatus};
pub use logging::RunLogger;
pub use narration::{Narration, SegmentSource, TimingAccumulator, PAUSE_SECS};
pub use pipeline::{Pipeline, PreparedRun, RunDiagnostics, RunOutput, Stage};
pub use sources::{discover_clips, load_script, Script};
pub use text::{Emphasizer, Segmenter};

/// Install the ring crypto provider used by the HTTP TTS client.
///
/// Returns `false` when a provider was already installed; the existing one
/// is kept.
pub fn install_crypto_provider() -> bool {
    match rustls::crypto::ring::default_provider().install_default() {
        Ok(()) => true,
        Err(_) => {
            warn!("rustls crypto provider already installed, keeping the existing one");
            false
        }
    }
}

/// Build the speech synthesizer for a run.
///
/// A client that cannot be constructed degrades to [`DisabledSynthesizer`],
/// so every sentence gets placeholder audio instead of the run failing.
pub fn build_synthesizer(config: &WorkerConfig) -> Arc<dyn SpeechSynthesizer> {
    if !config.tts_enabled {
        info!("Speech synthesis disabled, narration will use placeholder audio");
        return Arc::new(DisabledSynthesizer);
    }

    match HttpTtsClient::from_env() {
        Ok(client) => {
            info!(endpoint = %client.config().endpoint, "Using HTTP speech synthesis");
            Arc::new(client)
        }
        Err(e) => {
            warn!(error = %e, "Speech synthesis unavailable, narration will use placeholder audio");
            Arc::new(DisabledSynthesizer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_provider_install_reports_existing() {
        install_crypto_provider();
        assert!(!install_crypto_provider());
    }

    #[test]
    fn test_disabled_tts_builds_placeholder_synthesizer() {
        let config = WorkerConfig {
            tts_enabled: false,
            ..WorkerConfig::default()
        };
        assert_eq!(build_synthesizer(&config).name(), "disabled");
    }
}
