//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use vreel_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::{ProgressParser, StderrLine};

/// Engine diagnostic lines kept for error reports.
const STDERR_TAIL_LINES: usize = 40;

/// One `-i` input with its input-side options.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub args: Vec<String>,
    pub path: PathBuf,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), path)
    }

    /// Add an input file preceded by input options (e.g. `-f mp3`).
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Cap output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream (`0:v:0`) or graph label (`[vout]`) into the output.
    pub fn map(self, target: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(target)
    }

    /// Stop at the shortest output stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Append codec/quality arguments.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_ffmpeg_args())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress logging.
///
/// Runs are blocking from the pipeline's point of view: there is no
/// cancellation, and a non-zero exit is reported with the engine's own
/// diagnostic output.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Stage name used in logs and metrics
    stage: String,
    /// Expected output duration, for progress percentages
    expected_duration_ms: Option<i64>,
    /// Engine binary; resolved from PATH when unset
    program: Option<PathBuf>,
}

impl FfmpegRunner {
    /// Create a new runner for a named stage.
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            expected_duration_ms: None,
            program: None,
        }
    }

    /// Use a specific FFmpeg binary instead of the one on PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Set expected output duration used for progress percentages.
    pub fn with_expected_duration(mut self, seconds: f64) -> Self {
        self.expected_duration_ms = Some((seconds * 1000.0) as i64);
        self
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let ffmpeg = match &self.program {
            Some(program) => program.clone(),
            None => check_ffmpeg()?,
        };

        let args = cmd.build_args();
        debug!(stage = %self.stage, "Running FFmpeg: ffmpeg {}", args.join(" "));

        let started = Instant::now();
        metrics::counter!("vreel_ffmpeg_runs_total", "stage" => self.stage.clone()).increment(1);

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();

        let mut parser = ProgressParser::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut last_logged_pct = -10.0;

        // Engine output is not guaranteed to be UTF-8 (file names, codec
        // messages), so lines are read as bytes and decoded lossily.
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(stage = %self.stage, error = %e, "Stopped reading FFmpeg output");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            match parser.feed(&line) {
                StderrLine::Record(progress) => {
                    if let Some(total) = self.expected_duration_ms {
                        let pct = progress.percentage(total);
                        if pct - last_logged_pct >= 10.0 || progress.is_complete {
                            last_logged_pct = pct;
                            debug!(
                                stage = %self.stage,
                                percent = %format!("{:.0}", pct),
                                speed = progress.speed,
                                "FFmpeg progress"
                            );
                        }
                    }
                }
                StderrLine::Field => {}
                StderrLine::Diagnostic(text) if !text.is_empty() => {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(text);
                }
                StderrLine::Diagnostic(_) => {}
            }
        }

        let status = child.wait().await?;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("vreel_ffmpeg_duration_seconds", "stage" => self.stage.clone())
            .record(elapsed);

        if status.success() {
            info!(
                stage = %self.stage,
                output = %cmd.output().display(),
                elapsed_secs = %format!("{:.1}", elapsed),
                "FFmpeg finished"
            );
            Ok(())
        } else {
            let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
            warn!(stage = %self.stage, exit_code = ?status.code(), "FFmpeg failed");
            Err(MediaError::ffmpeg_failed(
                format!("{} pass exited with non-zero status", self.stage),
                if stderr.is_empty() { None } else { Some(stderr) },
                status.code(),
            ))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Bare FFmpeg command for one-shot helper invocations (decode, analysis).
pub(crate) fn create_ffmpeg_command() -> MediaResult<Command> {
    let ffmpeg = check_ffmpeg()?;
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-nostdin"])
        .stdin(Stdio::null())
        .kill_on_drop(true);
    Ok(cmd)
}
