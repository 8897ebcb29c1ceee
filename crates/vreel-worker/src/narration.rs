//! Narration timing.
//!
//! Drives the speech synthesizer sentence by sentence, concatenates the
//! decoded segments into one mono track, and records a cue for each
//! segment. Cue boundaries are read off the track's sample count, so the
//! timeline and the exported audio cannot drift apart.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use vreel_media::{DecodeTarget, DecoderChain, MediaError, MediaResult, PcmTrack};
use vreel_models::{Cue, RenderConfig, Timeline};
use vreel_tts::SpeechSynthesizer;

use crate::text::Emphasizer;

/// Gap inserted after every narrated sentence.
pub const PAUSE_SECS: f64 = 0.15;
/// Placeholder tone frequency.
pub const PLACEHOLDER_TONE_HZ: f64 = 440.0;
/// Placeholder tone level relative to full scale.
pub const PLACEHOLDER_TONE_DB: f64 = -10.0;
/// Silence substituted for audio that no decoder could read.
pub const UNREADABLE_SILENCE_SECS: f64 = 1.0;

/// Length of the placeholder tone for a sentence.
pub fn placeholder_duration(text: &str) -> f64 {
    text.chars().count() as f64 * 0.25 + 0.5
}

/// Where a narration segment came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentSource {
    /// Decoded synthesizer output
    Speech,
    /// Synthesis failed or produced nothing usable
    PlaceholderTone { reason: String },
    /// Synthesized bytes could not be decoded
    UnreadableSilence { reason: String },
}

impl SegmentSource {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, SegmentSource::Speech)
    }

    fn metric_reason(&self) -> &'static str {
        match self {
            SegmentSource::Speech => "none",
            SegmentSource::PlaceholderTone { .. } => "synthesis",
            SegmentSource::UnreadableSilence { .. } => "decode",
        }
    }
}

/// Merged narration track and the cues that describe it.
#[derive(Debug, Clone)]
pub struct Narration {
    pub track: PcmTrack,
    pub timeline: Timeline,
    /// One entry per sentence, in order
    pub sources: Vec<SegmentSource>,
}

impl Narration {
    pub fn fallback_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_fallback()).count()
    }

    /// Write the track as a 16-bit WAV with `channels` identical channels.
    pub async fn export_wav(&self, path: &Path, channels: u16) -> MediaResult<()> {
        let track = self.track.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || track.write_wav(&path, channels))
            .await
            .map_err(|e| MediaError::internal(format!("WAV export task failed: {}", e)))?
    }
}

/// Builds the narration track and timeline for a sentence sequence.
pub struct TimingAccumulator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    decoder: DecoderChain,
    emphasizer: Emphasizer,
    target: DecodeTarget,
}

impl TimingAccumulator {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: &RenderConfig) -> Self {
        Self {
            synthesizer,
            decoder: DecoderChain::standard(),
            emphasizer: Emphasizer::new(&config.keywords),
            target: DecodeTarget::new(config.sample_rate, config.narration_speed),
        }
    }

    /// Replace the decode strategy list.
    pub fn with_decoder(mut self, decoder: DecoderChain) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.target.sample_rate
    }

    /// Narrate `sentences` in order.
    ///
    /// Never fails: every sentence yields a non-empty segment, falling back
    /// to a placeholder tone or a fixed silence.
    pub async fn accumulate(&self, sentences: &[String]) -> Narration {
        let rate = self.target.sample_rate;
        let mut track = PcmTrack::empty(rate);
        let mut cues = Vec::with_capacity(sentences.len());
        let mut sources = Vec::with_capacity(sentences.len());

        info!(
            sentences = sentences.len(),
            synthesizer = self.synthesizer.name(),
            tempo = self.target.tempo,
            "Narrating script"
        );

        for (index, sentence) in sentences.iter().enumerate() {
            let (segment, source) = self.render_segment(sentence).await;

            if source.is_fallback() {
                metrics::counter!("vreel_tts_fallback_total", "reason" => source.metric_reason())
                    .increment(1);
            }

            let start = track.duration_secs();
            if let Err(e) = track.append(&segment) {
                warn!(index, error = %e, "Could not join segment, substituting silence");
                track.append_silence(segment.duration_secs());
            }
            let end = track.duration_secs();
            track.append_silence(PAUSE_SECS);

            debug!(index, start, end, source = ?source, "Timed sentence");
            cues.push(Cue::new(start, end, self.emphasizer.emphasize(sentence)));
            sources.push(source);
        }

        let timeline = Timeline::new(cues, track.duration_secs());
        info!(
            cues = timeline.len(),
            duration_secs = timeline.total_duration(),
            "Narration timed"
        );

        Narration {
            track,
            timeline,
            sources,
        }
    }

    async fn render_segment(&self, sentence: &str) -> (PcmTrack, SegmentSource) {
        let bytes = match self.synthesizer.synthesize(sentence).await {
            Ok(bytes) if bytes.is_empty() => {
                return self.placeholder(sentence, "synthesizer returned no audio".to_string());
            }
            Ok(bytes) => bytes,
            Err(e) => return self.placeholder(sentence, e.to_string()),
        };

        match self.decoder.decode(&bytes, self.target).await {
            Ok(track) if track.is_empty() => {
                self.placeholder(sentence, "decoded audio is empty".to_string())
            }
            Ok(track) => (track, SegmentSource::Speech),
            Err(exhausted) => {
                warn!(
                    text = %preview(sentence),
                    error = %exhausted,
                    "Unreadable speech audio, substituting silence"
                );
                (
                    PcmTrack::silence(self.target.sample_rate, UNREADABLE_SILENCE_SECS),
                    SegmentSource::UnreadableSilence {
                        reason: exhausted.to_string(),
                    },
                )
            }
        }
    }

    fn placeholder(&self, sentence: &str, reason: String) -> (PcmTrack, SegmentSource) {
        let seconds = placeholder_duration(sentence);
        warn!(
            text = %preview(sentence),
            reason = %reason,
            seconds,
            "Speech synthesis unusable, substituting placeholder tone"
        );
        (
            PcmTrack::tone(
                self.target.sample_rate,
                seconds,
                PLACEHOLDER_TONE_HZ,
                PLACEHOLDER_TONE_DB,
            ),
            SegmentSource::PlaceholderTone { reason },
        )
    }
}

fn preview(text: &str) -> String {
    text.chars().take(10).collect()
}
