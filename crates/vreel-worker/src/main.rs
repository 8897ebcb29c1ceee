//! Short-form video assembly binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vreel_models::Orientation;
use vreel_worker::{
    build_synthesizer, config::parse_keywords, install_crypto_provider, Pipeline, RunExecutor,
    WorkerConfig,
};

/// Assemble a narrated short-form video from clips, a script and music.
///
/// Flags override the matching `VREEL_*` environment variables.
#[derive(Debug, Parser)]
#[command(name = "vreel", version)]
struct Args {
    /// Directory of source clips (.mp4, .mov, .mkv)
    #[arg(long)]
    clips: Option<PathBuf>,

    /// Script file, or directory of .txt scripts to pick from
    #[arg(long)]
    script: Option<PathBuf>,

    /// Background music file
    #[arg(long)]
    bgm: Option<PathBuf>,

    /// Final video path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for intermediate artifacts
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// ASS template with an {events} placeholder
    #[arg(long)]
    template: Option<PathBuf>,

    /// portrait or landscape
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Narration speed multiplier (0.5-2.0)
    #[arg(long)]
    speed: Option<f64>,

    /// Hook caption; defaults to the script file name
    #[arg(long)]
    hook: Option<String>,

    /// Comma-separated keywords to emphasize in subtitles
    #[arg(long)]
    keywords: Option<String>,

    /// Disable the slow zoom
    #[arg(long)]
    no_zoompan: bool,

    /// Do not burn subtitles into the video
    #[arg(long)]
    no_subtitles: bool,

    /// Skip the TTS service and narrate with placeholder tones
    #[arg(long)]
    no_tts: bool,
}

impl Args {
    fn apply(self, mut config: WorkerConfig) -> WorkerConfig {
        if let Some(dir) = self.clips {
            config.clip_dir = dir;
        }
        if let Some(script) = self.script {
            config.script_path = script;
        }
        if let Some(bgm) = self.bgm {
            config.bgm_path = bgm;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if self.template.is_some() {
            config.ass_template = self.template;
        }
        if let Some(orientation) = self.orientation {
            config.orientation = orientation;
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        if self.hook.is_some() {
            config.hook_text = self.hook;
        }
        if let Some(keywords) = self.keywords {
            config.keywords = parse_keywords(&keywords);
        }
        config.zoompan &= !self.no_zoompan;
        config.burn_subtitles &= !self.no_subtitles;
        config.tts_enabled &= !self.no_tts;
        config
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,vreel=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing();

    install_crypto_provider();

    let config = match WorkerConfig::from_env() {
        Ok(config) => args.apply(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    info!("Run config: {:?}", config);

    let synthesizer = build_synthesizer(&config);
    let executor = RunExecutor::new();
    let handle = match executor.spawn(Pipeline::new(config, synthesizer)) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start run: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match handle.wait().await {
        Ok(output) => {
            info!(
                output = %output.output.display(),
                cues = output.timeline.len(),
                duration_secs = output.timeline.total_duration(),
                fallback_segments = output.fallback_segments,
                "Video assembled"
            );
            ExitCode::SUCCESS
        }
        Err(e) if e.is_input_error() => {
            error!("No usable input: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Processing failed: {}", e);
            if let Some(stderr) = e.engine_output() {
                error!("FFmpeg output:\n{}", stderr);
            }
            ExitCode::FAILURE
        }
    }
}
