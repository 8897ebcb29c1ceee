#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for short-form video assembly.
//!
//! This crate provides:
//! - Multi-input FFmpeg command building and a runner with progress parsing
//! - A typed filter graph with centralized label allocation and escaping
//! - The video composition and final mix graph builders
//! - ASS subtitle rendering
//! - Mono PCM tracks and ordered decode strategies for speech payloads
//! - Advisory diagnostics (loudness, stream presence)

pub mod audio;
pub mod command;
pub mod diagnostics;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod probe;
pub mod progress;
pub mod subtitles;

pub use audio::{DecodeExhausted, DecodeFailure, DecodeTarget, DecoderChain, PcmDecoder, PcmTrack};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use diagnostics::{check_audio_stream, check_volume, DiagnosticOutcome};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_artifact;
pub use graph::{
    build_composition, build_final_mix, CompiledGraph, Filter, FilterGraph, FinalMix, Label,
    MediaKind, MixInputs, StreamRef, VideoComposition,
};
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressParser};
pub use subtitles::{format_ass_time, write_subtitles, SubtitleTemplate};
