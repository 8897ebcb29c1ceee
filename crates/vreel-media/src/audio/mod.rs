//! Narration audio: in-memory PCM and decode strategies.

pub mod decode;
pub mod pcm;

pub use decode::{DecodeExhausted, DecodeFailure, DecodeTarget, DecoderChain, FfmpegDecoder, PcmDecoder, WavNative};
pub use pcm::{seconds_to_samples, PcmTrack};
