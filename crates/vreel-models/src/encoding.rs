//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default pixel format, widest player compatibility
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// CRF for the intermediate composition pass
pub const COMPOSITION_CRF: u8 = 18;
/// CRF for the final mux pass (re-encodes once more for burned subtitles)
pub const FINAL_CRF: u8 = 20;
/// Audio bitrate for the final mux
pub const FINAL_AUDIO_BITRATE: &str = "256k";

/// Video encoding configuration.
///
/// Treated as opaque pass-through by the graph builders: it only turns into
/// FFmpeg output arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Output pixel format
    #[serde(default)]
    pub pixel_format: Option<String>,

    /// Audio codec; `None` drops audio from the output (`-an`)
    #[serde(default)]
    pub audio_codec: Option<String>,

    /// Audio bitrate
    #[serde(default)]
    pub audio_bitrate: Option<String>,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    COMPOSITION_CRF
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_composition()
    }
}

impl EncodingConfig {
    /// Video-only encode used for the composed intermediate clip.
    pub fn for_composition() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: COMPOSITION_CRF,
            pixel_format: Some(DEFAULT_PIXEL_FORMAT.to_string()),
            audio_codec: None,
            audio_bitrate: None,
            extra_args: Vec::new(),
        }
    }

    /// Audio+video encode used for the final file.
    pub fn for_final_mux() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: FINAL_CRF,
            pixel_format: None,
            audio_codec: Some(DEFAULT_AUDIO_CODEC.to_string()),
            audio_bitrate: Some(FINAL_AUDIO_BITRATE.to_string()),
            extra_args: Vec::new(),
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Whether the output carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.audio_codec.is_none() {
            args.push("-an".to_string());
        }

        args.extend_from_slice(&[
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ]);

        if let Some(ref pix_fmt) = self.pixel_format {
            args.extend_from_slice(&["-pix_fmt".to_string(), pix_fmt.clone()]);
        }

        if let Some(ref codec) = self.audio_codec {
            args.extend_from_slice(&["-c:a".to_string(), codec.clone()]);
            if let Some(ref bitrate) = self.audio_bitrate {
                args.extend_from_slice(&["-b:a".to_string(), bitrate.clone()]);
            }
        }

        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_is_video_only() {
        let config = EncodingConfig::for_composition();
        let args = config.to_ffmpeg_args();
        assert_eq!(args[0], "-an");
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"18".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_final_mux_args() {
        let config = EncodingConfig::for_final_mux();
        let args = config.to_ffmpeg_args();
        assert!(!args.contains(&"-an".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"256k".to_string()));
        assert!(args.contains(&"20".to_string()));
    }

    #[test]
    fn test_with_crf() {
        let config = EncodingConfig::for_final_mux().with_crf(23);
        assert_eq!(config.crf, 23);
        assert!(config.has_audio());
    }
}
