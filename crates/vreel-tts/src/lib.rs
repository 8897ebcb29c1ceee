//! Speech synthesis for narration.
//!
//! This crate provides the [`SpeechSynthesizer`] adapter trait and a client
//! for an HTTP TTS service that answers a JSON envelope pointing at the
//! rendered audio file.

pub mod client;
pub mod error;
pub mod synthesizer;
pub mod types;

pub use client::{HttpTtsClient, TtsClientConfig};
pub use error::{TtsError, TtsResult};
pub use synthesizer::{DisabledSynthesizer, SpeechSynthesizer};
pub use types::SynthesisEnvelope;
