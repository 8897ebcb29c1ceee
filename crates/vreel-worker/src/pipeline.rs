//! Pipeline orchestration.
//!
//! One run walks the stages strictly in order. Input problems are reported
//! before any file is written or FFmpeg is invoked; an FFmpeg failure
//! aborts the remaining stages.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use vreel_media::{
    build_composition, build_final_mix, check_audio_stream, check_volume, move_artifact,
    write_subtitles, DecoderChain, DiagnosticOutcome, FfmpegRunner, MixInputs, SubtitleTemplate,
};
use vreel_models::{RenderConfig, Timeline};
use vreel_tts::SpeechSynthesizer;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::narration::TimingAccumulator;
use crate::sources::{discover_clips, expand_clip_list, load_script, shuffle_clips};
use crate::text::Segmenter;

/// Narration is exported as stereo.
const NARRATION_CHANNELS: u16 = 2;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inputs,
    Narration,
    Subtitles,
    Composition,
    FinalMix,
    Diagnostics,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Inputs => "inputs",
            Stage::Narration => "narration",
            Stage::Subtitles => "subtitles",
            Stage::Composition => "composition",
            Stage::FinalMix => "final_mix",
            Stage::Diagnostics => "diagnostics",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Called whenever a run enters a new stage.
pub type StageObserver = Arc<dyn Fn(Stage) + Send + Sync>;

/// Everything the run needs, resolved and validated before any output is produced.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    /// Shuffled, repeated and capped clip list
    pub clips: Vec<PathBuf>,
    /// Segmented narration sentences
    pub sentences: Vec<String>,
    pub render: RenderConfig,
    pub script_source: PathBuf,
}

/// Advisory checks recorded for a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDiagnostics {
    pub narration_volume: DiagnosticOutcome,
    pub output_audio: DiagnosticOutcome,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub output: PathBuf,
    pub timeline: Timeline,
    pub diagnostics: RunDiagnostics,
    /// Sentences narrated with a placeholder instead of speech
    pub fallback_segments: usize,
}

/// One pipeline run.
pub struct Pipeline {
    config: WorkerConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    decoder: Option<DecoderChain>,
    observers: Vec<StageObserver>,
    logger: RunLogger,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            config,
            synthesizer,
            decoder: None,
            observers: Vec::new(),
            logger: RunLogger::new(Stage::Inputs.as_str()),
        }
    }

    /// Use a custom decode strategy list instead of the standard one.
    pub fn with_decoder(mut self, decoder: DecoderChain) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_stage_observer(mut self, observer: StageObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn run_id(&self) -> &str {
        self.logger.run_id()
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Resolve clips, script, music and render configuration.
    ///
    /// Only reads the filesystem; any failure here is an input error.
    pub async fn prepare(&self) -> WorkerResult<PreparedRun> {
        let mut clips = discover_clips(&self.config.clip_dir).await?;
        let script = load_script(&self.config.script_path).await?;

        if !fs::try_exists(&self.config.bgm_path).await.unwrap_or(false) {
            return Err(WorkerError::MissingMusic(self.config.bgm_path.clone()));
        }

        let render = self.config.render_config(script.hook.as_deref())?;

        let sentences = Segmenter::new(render.max_sentence_chars)
            .segment_lines(script.lines.iter().map(String::as_str));
        if sentences.is_empty() {
            return Err(WorkerError::NoScript(script.source));
        }

        shuffle_clips(&mut clips);
        let clips = expand_clip_list(&clips, render.clip_repeat, render.max_clip_inputs);

        Ok(PreparedRun {
            clips,
            sentences,
            render,
            script_source: script.source,
        })
    }

    /// Run every stage to completion.
    pub async fn run(mut self) -> WorkerResult<RunOutput> {
        self.enter(Stage::Inputs);
        self.logger.log_start(&format!(
            "clips from {}, script from {}",
            self.config.clip_dir.display(),
            self.config.script_path.display()
        ));

        let prepared = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.logger.log_error(&e.to_string());
                return Err(e);
            }
        };
        self.logger.log_progress(&format!(
            "{} sentences from {}, {} clip inputs, {}x{}",
            prepared.sentences.len(),
            prepared.script_source.display(),
            prepared.clips.len(),
            prepared.render.width,
            prepared.render.height
        ));

        let result = self.execute(prepared).await;
        match &result {
            Ok(output) => self
                .logger
                .log_completion(&format!("wrote {}", output.output.display())),
            Err(e) => self.logger.log_error(&e.to_string()),
        }
        result
    }

    async fn execute(&mut self, prepared: PreparedRun) -> WorkerResult<RunOutput> {
        let work_dir = self.config.work_dir.clone();
        fs::create_dir_all(&work_dir).await?;
        let render = &prepared.render;

        self.enter(Stage::Narration);
        let mut accumulator = TimingAccumulator::new(self.synthesizer.clone(), render);
        if let Some(decoder) = self.decoder.take() {
            accumulator = accumulator.with_decoder(decoder);
        }
        let narration = accumulator.accumulate(&prepared.sentences).await;

        let voice = work_dir.join("voice.wav");
        narration.export_wav(&voice, NARRATION_CHANNELS).await?;
        let narration_volume = check_volume(&voice).await;
        narration_volume.log("narration_volume", &voice);

        let fallback_segments = narration.fallback_count();
        if fallback_segments > 0 {
            self.logger.log_warning(&format!(
                "{} of {} sentences use placeholder audio",
                fallback_segments,
                narration.sources.len()
            ));
        }

        self.enter(Stage::Subtitles);
        let template =
            SubtitleTemplate::load(self.config.ass_template.as_deref(), render.width, render.height)
                .await;
        let subtitles = work_dir.join("sub.ass");
        write_subtitles(&narration.timeline, &template, &subtitles).await?;

        self.enter(Stage::Composition);
        let composition = build_composition(&prepared.clips, render)?;
        let clip = work_dir.join("clip.mp4");
        FfmpegRunner::new("compose")
            .with_expected_duration(composition.duration_cap())
            .run(&composition.to_command(&clip)?)
            .await?;

        self.enter(Stage::FinalMix);
        let mix = build_final_mix(
            MixInputs {
                video: clip,
                narration: voice,
                music: self.config.bgm_path.clone(),
                subtitles: Some(subtitles),
            },
            render,
        )?;
        let rendered = work_dir.join("final.mp4");
        FfmpegRunner::new("final_mix")
            .with_expected_duration(render.duration_cap_secs)
            .run(&mix.to_command(&rendered)?)
            .await?;
        move_artifact(&rendered, &self.config.output).await?;

        self.enter(Stage::Diagnostics);
        let output_audio = check_audio_stream(&self.config.output).await;
        output_audio.log("output_audio", &self.config.output);

        Ok(RunOutput {
            output: self.config.output.clone(),
            timeline: narration.timeline,
            diagnostics: RunDiagnostics {
                narration_volume,
                output_audio,
            },
            fallback_segments,
        })
    }

    fn enter(&mut self, stage: Stage) {
        self.logger = self.logger.for_stage(stage.as_str());
        self.logger.log_progress(&format!("entering {}", stage));
        for observer in &self.observers {
            observer(stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vreel_tts::DisabledSynthesizer;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        async fn new(clips: usize, script: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let clip_dir = dir.path().join("clips");
            fs::create_dir(&clip_dir).await.unwrap();
            for i in 0..clips {
                fs::write(clip_dir.join(format!("{i}.mp4")), b"x").await.unwrap();
            }
            fs::write(dir.path().join("钩子.txt"), script).await.unwrap();
            fs::write(dir.path().join("bgm.mp3"), b"x").await.unwrap();
            Self { dir }
        }

        fn config(&self) -> WorkerConfig {
            let root = self.dir.path();
            WorkerConfig {
                work_dir: root.join("work"),
                output: root.join("out").join("final.mp4"),
                clip_dir: root.join("clips"),
                script_path: root.join("钩子.txt"),
                bgm_path: root.join("bgm.mp3"),
                ..WorkerConfig::default()
            }
        }
    }

    fn pipeline(config: WorkerConfig) -> Pipeline {
        Pipeline::new(config, Arc::new(DisabledSynthesizer))
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::FinalMix.to_string(), "final_mix");
        assert_eq!(serde_json::to_string(&Stage::Narration).unwrap(), "\"narration\"");
    }

    #[tokio::test]
    async fn test_prepare_resolves_inputs() {
        let fixture = Fixture::new(3, "你好。世界。\n\n第二行").await;
        let prepared = pipeline(fixture.config()).prepare().await.unwrap();

        assert_eq!(prepared.sentences, vec!["你好。", "世界。", "第二行"]);
        assert_eq!(prepared.clips.len(), 15);
        assert_eq!(prepared.render.hook_text.as_deref(), Some("钩子"));
    }

    #[tokio::test]
    async fn test_prepare_caps_clip_inputs() {
        let fixture = Fixture::new(7, "你好").await;
        let prepared = pipeline(fixture.config()).prepare().await.unwrap();
        assert_eq!(prepared.clips.len(), 20);
    }

    #[tokio::test]
    async fn test_zero_clips_aborts_before_output() {
        let fixture = Fixture::new(0, "你好").await;
        let config = fixture.config();
        let work_dir = config.work_dir.clone();

        let err = pipeline(config).run().await.unwrap_err();
        assert!(matches!(err, WorkerError::NoClips(_)));
        assert!(err.is_input_error());
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_music_is_input_error() {
        let fixture = Fixture::new(2, "你好").await;
        let config = WorkerConfig {
            bgm_path: fixture.dir.path().join("nope.mp3"),
            ..fixture.config()
        };
        let err = pipeline(config).prepare().await.unwrap_err();
        assert!(matches!(err, WorkerError::MissingMusic(_)));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_invalid_speed_is_input_error() {
        let fixture = Fixture::new(2, "你好").await;
        let config = WorkerConfig {
            speed: 9.0,
            ..fixture.config()
        };
        let err = pipeline(config).prepare().await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_observer_sees_inputs_stage() {
        let fixture = Fixture::new(0, "你好").await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let result = pipeline(fixture.config())
            .with_stage_observer(Arc::new(move |stage| sink.lock().unwrap().push(stage)))
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![Stage::Inputs]);
    }
}
