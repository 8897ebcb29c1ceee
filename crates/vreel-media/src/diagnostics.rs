//! Advisory checks on produced media.
//!
//! Checks never fail the pipeline: every problem, including a missing
//! engine, becomes a [`DiagnosticOutcome`] that the caller logs.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::command::create_ffmpeg_command;
use crate::probe::probe_media;

/// Peak level below which a track counts as nearly silent.
pub const SILENCE_MAX_DB: f64 = -50.0;

static MEAN_VOLUME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"mean_volume:\s*([-.\d]+)\s*dB").ok());
static MAX_VOLUME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"max_volume:\s*([-.\d]+)\s*dB").ok());

/// Result of one advisory check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Pass { detail: String },
    Warning { detail: String },
    Fail { detail: String },
}

impl DiagnosticOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, DiagnosticOutcome::Pass { .. })
    }

    pub fn detail(&self) -> &str {
        match self {
            DiagnosticOutcome::Pass { detail }
            | DiagnosticOutcome::Warning { detail }
            | DiagnosticOutcome::Fail { detail } => detail,
        }
    }

    /// Emit the outcome at a level matching its severity.
    pub fn log(&self, check: &str, path: &Path) {
        match self {
            DiagnosticOutcome::Pass { detail } => {
                info!(check, path = %path.display(), detail = %detail, "Diagnostic passed")
            }
            DiagnosticOutcome::Warning { detail } => {
                warn!(check, path = %path.display(), detail = %detail, "Diagnostic warning")
            }
            DiagnosticOutcome::Fail { detail } => {
                warn!(check, path = %path.display(), detail = %detail, "Diagnostic failed")
            }
        }
    }
}

/// Levels reported by FFmpeg's `volumedetect` filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeStats {
    pub mean_db: f64,
    pub max_db: f64,
}

/// Extract mean/max volume from `volumedetect` stderr.
pub fn parse_volumedetect(stderr: &str) -> Option<VolumeStats> {
    let capture = |re: &Option<Regex>| -> Option<f64> {
        re.as_ref()?.captures(stderr)?.get(1)?.as_str().parse().ok()
    };

    Some(VolumeStats {
        mean_db: capture(&MEAN_VOLUME)?,
        max_db: capture(&MAX_VOLUME)?,
    })
}

/// Judge volume statistics.
pub fn assess_volume(stats: Option<VolumeStats>) -> DiagnosticOutcome {
    match stats {
        Some(s) if s.max_db < SILENCE_MAX_DB => DiagnosticOutcome::Warning {
            detail: format!("nearly silent (mean {} dB, max {} dB)", s.mean_db, s.max_db),
        },
        Some(s) => DiagnosticOutcome::Pass {
            detail: format!("mean {} dB, max {} dB", s.mean_db, s.max_db),
        },
        None => DiagnosticOutcome::Warning {
            detail: "could not parse volumedetect output".to_string(),
        },
    }
}

/// Measure the loudness of an audio file.
pub async fn check_volume(path: &Path) -> DiagnosticOutcome {
    let mut cmd = match create_ffmpeg_command() {
        Ok(cmd) => cmd,
        Err(e) => return DiagnosticOutcome::Fail { detail: e.to_string() },
    };

    let output = cmd
        .arg("-i")
        .arg(path)
        .args(["-af", "volumedetect", "-vn", "-f", "null", "-"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(out) => assess_volume(parse_volumedetect(&String::from_utf8_lossy(&out.stderr))),
        Err(e) => DiagnosticOutcome::Fail {
            detail: format!("volumedetect did not run: {}", e),
        },
    }
}

/// Confirm the final file carries an audio stream.
pub async fn check_audio_stream(path: &Path) -> DiagnosticOutcome {
    match probe_media(path).await {
        Ok(info) if info.has_audio => DiagnosticOutcome::Pass {
            detail: format!(
                "audio stream present ({})",
                info.audio_codec.as_deref().unwrap_or("unknown codec")
            ),
        },
        Ok(_) => DiagnosticOutcome::Fail {
            detail: "no audio stream found".to_string(),
        },
        Err(e) => DiagnosticOutcome::Fail {
            detail: format!("ffprobe error: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUMEDETECT: &str = "\
[Parsed_volumedetect_0 @ 0x600] n_samples: 144000
[Parsed_volumedetect_0 @ 0x600] mean_volume: -23.4 dB
[Parsed_volumedetect_0 @ 0x600] max_volume: -3.1 dB
[Parsed_volumedetect_0 @ 0x600] histogram_3db: 12";

    #[test]
    fn test_parse_volumedetect() {
        let stats = parse_volumedetect(VOLUMEDETECT).unwrap();
        assert_eq!(stats, VolumeStats { mean_db: -23.4, max_db: -3.1 });
        assert!(parse_volumedetect("no stats here").is_none());
    }

    #[test]
    fn test_assess_volume() {
        assert!(assess_volume(parse_volumedetect(VOLUMEDETECT)).is_pass());

        let silent = VolumeStats { mean_db: -91.0, max_db: -91.0 };
        let outcome = assess_volume(Some(silent));
        assert!(matches!(outcome, DiagnosticOutcome::Warning { .. }));
        assert!(outcome.detail().contains("nearly silent"));

        assert!(matches!(assess_volume(None), DiagnosticOutcome::Warning { .. }));
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let json = serde_json::to_string(&DiagnosticOutcome::Fail {
            detail: "no audio stream found".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"fail","detail":"no audio stream found"}"#);
    }

    #[tokio::test]
    async fn test_missing_file_is_failure_not_error() {
        let outcome = check_audio_stream(Path::new("/nonexistent/final.mp4")).await;
        assert!(matches!(outcome, DiagnosticOutcome::Fail { .. }));
    }
}
