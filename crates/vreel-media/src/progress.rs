//! FFmpeg `-progress pipe:2` parsing.
//!
//! Progress records and engine diagnostics share stderr, so the parser also
//! tells the runner which lines are diagnostics worth keeping.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Classification of one stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// A `progress=` terminator completed a record
    Record(FfmpegProgress),
    /// A `key=value` field folded into the pending record
    Field,
    /// Anything else: warnings and errors from the engine
    Diagnostic(String),
}

/// Incremental parser for FFmpeg's key=value progress stream.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stderr line.
    pub fn feed(&mut self, line: &str) -> StderrLine {
        let line = line.trim();

        let Some((key, value)) = line.split_once('=') else {
            return StderrLine::Diagnostic(line.to_string());
        };

        match key {
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds in current FFmpeg builds
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.is_complete = value == "end";
                return StderrLine::Record(self.current.clone());
            }
            "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames" => {}
            k if k.starts_with("stream_") => {}
            _ => return StderrLine::Diagnostic(line.to_string()),
        }

        StderrLine::Field
    }
}
