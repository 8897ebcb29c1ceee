//! Final pass graph: narration ducking over music, loudness normalization,
//! subtitle burn-in.

use std::path::{Path, PathBuf};

use tracing::debug;
use vreel_models::{EncodingConfig, RenderConfig};

use super::{filter_path, CompiledGraph, Filter, FilterGraph, MediaKind, StreamRef};
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

const VIDEO_INPUT: usize = 0;
const NARRATION_INPUT: usize = 1;
const MUSIC_INPUT: usize = 2;

const NARRATION_GAIN: f64 = 1.5;
const MUSIC_GAIN: f64 = 0.2;

/// Loudness target for short-form platforms (EBU R128 style).
const LOUDNESS_I: f64 = -14.0;
const LOUDNESS_TP: &str = "-1.0";
const LOUDNESS_LRA: f64 = 7.0;

/// Files feeding the final pass, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct MixInputs {
    /// Composed video from the video pass
    pub video: PathBuf,
    /// Narration WAV
    pub narration: PathBuf,
    /// Background music
    pub music: PathBuf,
    /// ASS document to burn in, if any
    pub subtitles: Option<PathBuf>,
}

/// Final pass: graph plus engine invocation parameters.
#[derive(Debug, Clone)]
pub struct FinalMix {
    graph: CompiledGraph,
    inputs: MixInputs,
    encoding: EncodingConfig,
}

impl FinalMix {
    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn inputs(&self) -> &MixInputs {
        &self.inputs
    }

    /// Build the engine invocation writing to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>) -> MediaResult<FfmpegCommand> {
        let video = self
            .graph
            .output(MediaKind::Video)
            .ok_or_else(|| MediaError::invalid_graph("final pass has no video output"))?;
        let audio = self
            .graph
            .output(MediaKind::Audio)
            .ok_or_else(|| MediaError::invalid_graph("final pass has no audio output"))?;

        Ok(FfmpegCommand::new(output)
            .input(&self.inputs.video)
            .input(&self.inputs.narration)
            .input(&self.inputs.music)
            .filter_complex(self.graph.description())
            .map(video.map_arg())
            .map(audio.map_arg())
            .encoding(&self.encoding)
            .shortest())
    }
}

/// Build the final mux graph.
///
/// Music is ducked by the narration through a sidechain compressor, mixed
/// with the narration for the longest of the two, then loudness normalized.
/// The subtitle document is burned onto input 0's video when configured.
pub fn build_final_mix(inputs: MixInputs, config: &RenderConfig) -> MediaResult<FinalMix> {
    let mut graph = FilterGraph::new(3);
    let rate = config.sample_rate;

    let narration = graph.input(NARRATION_INPUT, MediaKind::Audio);
    let voice = graph.fan_out(
        vec![narration],
        vec![
            Filter::new("volume").positional(NARRATION_GAIN),
            Filter::new("aresample").positional(rate),
            Filter::new("asplit").positional(2),
        ],
        &["voice_ctrl", "voice_out"],
        MediaKind::Audio,
    );
    let (voice_ctrl, voice_out) = match voice.as_slice() {
        [ctrl, out] => (ctrl.clone(), out.clone()),
        _ => return Err(MediaError::internal("asplit must yield two pads")),
    };

    let music = graph.input(MUSIC_INPUT, MediaKind::Audio);
    let music = graph.chain(
        vec![music],
        vec![
            Filter::new("volume").positional(MUSIC_GAIN),
            Filter::new("aresample").positional(rate),
        ],
        "bgm_in",
        MediaKind::Audio,
    );

    let ducked = graph.chain(
        vec![music.into(), voice_ctrl.into()],
        vec![Filter::new("sidechaincompress")
            .arg("threshold", 0.05)
            .arg("ratio", 10)
            .arg("attack", 5)
            .arg("release", 200)],
        "bgm_ducked",
        MediaKind::Audio,
    );

    let mixed = graph.chain(
        vec![ducked.into(), voice_out.into()],
        vec![Filter::new("amix").arg("inputs", 2).arg("duration", "longest")],
        "mix_raw",
        MediaKind::Audio,
    );

    let audio_out = graph.chain(
        vec![mixed.into()],
        vec![Filter::new("loudnorm")
            .arg("I", LOUDNESS_I)
            .arg("TP", LOUDNESS_TP)
            .arg("LRA", LOUDNESS_LRA)],
        "aout",
        MediaKind::Audio,
    );

    let video_in = graph.input(VIDEO_INPUT, MediaKind::Video);
    let video_out: StreamRef = match (&inputs.subtitles, config.burn_subtitles) {
        (Some(path), true) => graph
            .chain(
                vec![video_in],
                vec![Filter::new("ass").arg("filename", filter_path(path))],
                "vout",
                MediaKind::Video,
            )
            .into(),
        _ => video_in,
    };

    let burn = matches!(video_out, StreamRef::Label(_));
    let graph = graph.finish(vec![video_out, audio_out.into()])?;
    debug!(burn_subtitles = burn, "Built final mix graph");

    Ok(FinalMix {
        graph,
        inputs,
        encoding: config.final_mux.clone(),
    })
}
