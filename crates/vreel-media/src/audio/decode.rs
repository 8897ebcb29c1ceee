//! Decode strategies for synthesized speech payloads.
//!
//! The payload format is not known up front. [`DecoderChain`] tries an
//! explicit, ordered list of [`PcmDecoder`]s and reports every failure
//! reason when none succeeds.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::pcm::PcmTrack;
use crate::command::create_ffmpeg_command;

/// Tempo changes smaller than this are skipped.
const TEMPO_EPSILON: f64 = 0.01;

/// Output format requested from a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeTarget {
    /// Output sample rate (mono)
    pub sample_rate: u32,
    /// Pitch-preserving tempo multiplier
    pub tempo: f64,
}

impl DecodeTarget {
    pub fn new(sample_rate: u32, tempo: f64) -> Self {
        Self { sample_rate, tempo }
    }

    pub fn needs_tempo_change(&self) -> bool {
        (self.tempo - 1.0).abs() >= TEMPO_EPSILON
    }
}

/// Why a single strategy could not produce PCM.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeFailure {
    #[error("payload is empty")]
    Empty,

    #[error("unsupported by this strategy: {0}")]
    Unsupported(String),

    #[error("decode engine unavailable")]
    EngineUnavailable,

    #[error("decode engine failed: {stderr}")]
    EngineFailed { stderr: String },

    #[error("malformed audio: {0}")]
    Malformed(String),
}

/// Every strategy failed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeExhausted {
    pub attempts: Vec<(String, DecodeFailure)>,
}

impl fmt::Display for DecodeExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no decoder accepted the payload")?;
        for (name, failure) in &self.attempts {
            write!(f, "; {}: {}", name, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeExhausted {}

/// One way of turning an opaque payload into mono PCM.
#[async_trait]
pub trait PcmDecoder: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    async fn decode(&self, bytes: &[u8], target: DecodeTarget) -> Result<PcmTrack, DecodeFailure>;
}

/// In-process RIFF/WAVE decoding. Cannot change tempo.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavNative;

#[async_trait]
impl PcmDecoder for WavNative {
    fn name(&self) -> &str {
        "wav-native"
    }

    async fn decode(&self, bytes: &[u8], target: DecodeTarget) -> Result<PcmTrack, DecodeFailure> {
        if bytes.is_empty() {
            return Err(DecodeFailure::Empty);
        }
        if target.needs_tempo_change() {
            return Err(DecodeFailure::Unsupported("tempo change".to_string()));
        }
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(DecodeFailure::Unsupported("not a RIFF/WAVE payload".to_string()));
        }

        PcmTrack::from_wav_bytes(bytes, target.sample_rate)
            .map_err(|e| DecodeFailure::Malformed(e.to_string()))
    }
}

/// Decoding through the FFmpeg CLI, either autodetecting the container or
/// forcing a named demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    format: Option<String>,
    name: String,
}

impl FfmpegDecoder {
    /// Let FFmpeg probe the payload.
    pub fn probe() -> Self {
        Self {
            format: None,
            name: "ffmpeg-probe".to_string(),
        }
    }

    /// Force a demuxer, e.g. `mp3`.
    pub fn forced(format: impl Into<String>) -> Self {
        let format = format.into();
        Self {
            name: format!("ffmpeg-{}", format),
            format: Some(format),
        }
    }

    fn args(&self, input: &str, target: DecodeTarget) -> Vec<String> {
        let mut args: Vec<String> = vec!["-v".into(), "error".into()];
        if let Some(format) = &self.format {
            args.extend(["-f".into(), format.clone()]);
        }
        args.extend(["-i".into(), input.to_string(), "-vn".into()]);
        if target.needs_tempo_change() {
            args.extend(["-filter:a".into(), format!("atempo={}", target.tempo)]);
        }
        args.extend([
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            target.sample_rate.to_string(),
            "-f".into(),
            "s16le".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "pipe:1".into(),
        ]);
        args
    }
}

#[async_trait]
impl PcmDecoder for FfmpegDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decode(&self, bytes: &[u8], target: DecodeTarget) -> Result<PcmTrack, DecodeFailure> {
        if bytes.is_empty() {
            return Err(DecodeFailure::Empty);
        }

        let mut cmd = create_ffmpeg_command().map_err(|_| DecodeFailure::EngineUnavailable)?;

        let payload = tempfile::Builder::new()
            .prefix("vreel-speech-")
            .suffix(".bin")
            .tempfile()
            .map_err(|e| DecodeFailure::EngineFailed { stderr: e.to_string() })?;
        tokio::fs::write(payload.path(), bytes)
            .await
            .map_err(|e| DecodeFailure::EngineFailed { stderr: e.to_string() })?;

        let input = payload.path().to_string_lossy().to_string();
        let output = cmd
            .args(self.args(&input, target))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DecodeFailure::EngineFailed { stderr: e.to_string() })?;

        if !output.status.success() {
            return Err(DecodeFailure::EngineFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let samples: Vec<i16> = output
            .stdout
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        if samples.is_empty() {
            return Err(DecodeFailure::Malformed("engine produced no samples".to_string()));
        }

        Ok(PcmTrack::new(target.sample_rate, samples))
    }
}

/// Ordered list of decode strategies; the first success wins.
pub struct DecoderChain {
    strategies: Vec<Box<dyn PcmDecoder>>,
}

impl DecoderChain {
    pub fn new(strategies: Vec<Box<dyn PcmDecoder>>) -> Self {
        Self { strategies }
    }

    /// Native WAV, then FFmpeg autodetect, then FFmpeg forced to MP3.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(WavNative),
            Box::new(FfmpegDecoder::probe()),
            Box::new(FfmpegDecoder::forced("mp3")),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn decode(
        &self,
        bytes: &[u8],
        target: DecodeTarget,
    ) -> Result<PcmTrack, DecodeExhausted> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            match strategy.decode(bytes, target).await {
                Ok(track) => {
                    debug!(
                        strategy = strategy.name(),
                        duration_secs = track.duration_secs(),
                        "Decoded speech payload"
                    );
                    return Ok(track);
                }
                Err(failure) => {
                    debug!(strategy = strategy.name(), reason = %failure, "Decode strategy failed");
                    let stop = failure == DecodeFailure::Empty;
                    attempts.push((strategy.name().to_string(), failure));
                    if stop {
                        break;
                    }
                }
            }
        }

        Err(DecodeExhausted { attempts })
    }
}

impl fmt::Debug for DecoderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderChain")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: DecodeTarget = DecodeTarget {
        sample_rate: 48_000,
        tempo: 1.0,
    };

    struct Refuse;

    #[async_trait]
    impl PcmDecoder for Refuse {
        fn name(&self) -> &str {
            "refuse"
        }

        async fn decode(&self, _: &[u8], _: DecodeTarget) -> Result<PcmTrack, DecodeFailure> {
            Err(DecodeFailure::Unsupported("never".to_string()))
        }
    }

    fn wav(seconds: f64) -> Vec<u8> {
        PcmTrack::silence(24_000, seconds).to_wav_bytes(1).unwrap()
    }

    #[tokio::test]
    async fn test_wav_native_decodes() {
        let track = WavNative.decode(&wav(0.6), TARGET).await.unwrap();
        assert_eq!(track.sample_rate(), 48_000);
        assert_eq!(track.len(), 28_800);
    }

    #[tokio::test]
    async fn test_wav_native_failures() {
        assert_eq!(WavNative.decode(&[], TARGET).await, Err(DecodeFailure::Empty));
        assert!(matches!(
            WavNative.decode(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00", TARGET).await,
            Err(DecodeFailure::Unsupported(_))
        ));
        let fast = DecodeTarget::new(48_000, 1.2);
        assert!(matches!(
            WavNative.decode(&wav(0.1), fast).await,
            Err(DecodeFailure::Unsupported(_))
        ));

        let mut truncated = wav(0.1);
        truncated.truncate(30);
        assert!(matches!(
            WavNative.decode(&truncated, TARGET).await,
            Err(DecodeFailure::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_falls_through_in_order() {
        let chain = DecoderChain::new(vec![Box::new(Refuse), Box::new(WavNative)]);
        let track = chain.decode(&wav(0.5), TARGET).await.unwrap();
        assert_eq!(track.len(), 24_000);
    }

    #[tokio::test]
    async fn test_chain_reports_every_attempt() {
        let chain = DecoderChain::new(vec![Box::new(Refuse), Box::new(Refuse)]);
        let err = chain.decode(b"junk", TARGET).await.unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert!(err.to_string().contains("refuse: unsupported"));
    }

    #[tokio::test]
    async fn test_chain_stops_on_empty_payload() {
        let chain = DecoderChain::new(vec![Box::new(WavNative), Box::new(Refuse)]);
        let err = chain.decode(&[], TARGET).await.unwrap_err();
        assert_eq!(err.attempts, vec![("wav-native".to_string(), DecodeFailure::Empty)]);
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            DecoderChain::standard().strategy_names(),
            vec!["wav-native", "ffmpeg-probe", "ffmpeg-mp3"]
        );
    }

    #[test]
    fn test_tempo_threshold() {
        assert!(!TARGET.needs_tempo_change());
        assert!(!DecodeTarget::new(48_000, 1.005).needs_tempo_change());
        assert!(DecodeTarget::new(48_000, 1.2).needs_tempo_change());
        assert!(DecodeTarget::new(48_000, 0.8).needs_tempo_change());
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = FfmpegDecoder::forced("mp3").args("in.bin", DecodeTarget::new(48_000, 1.2));
        let joined = args.join(" ");
        assert!(joined.starts_with("-v error -f mp3 -i in.bin -vn -filter:a atempo=1.2"));
        assert!(joined.ends_with("-ac 1 -ar 48000 -f s16le -acodec pcm_s16le pipe:1"));

        let probe = FfmpegDecoder::probe().args("in.bin", TARGET).join(" ");
        assert!(!probe.contains("atempo"));
        assert!(probe.starts_with("-v error -i in.bin"));
    }
}
