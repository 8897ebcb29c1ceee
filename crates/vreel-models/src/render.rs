//! Render configuration and canvas orientation presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::encoding::EncodingConfig;

/// Default cap on characters per narrated/displayed sentence.
pub const DEFAULT_MAX_SENTENCE_CHARS: usize = 18;
/// Default cap on the number of clip inputs handed to one composition graph.
pub const DEFAULT_MAX_CLIP_INPUTS: usize = 20;
/// How many times the shuffled clip list is repeated before truncation.
pub const DEFAULT_CLIP_REPEAT: usize = 5;
/// Slowest/fastest narration tempo accepted by a single `atempo` stage.
pub const MIN_NARRATION_SPEED: f64 = 0.5;
pub const MAX_NARRATION_SPEED: f64 = 2.0;

/// Canvas orientation preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// 9:16, short-form platforms
    #[default]
    Portrait,
    /// 16:9, long-form platforms
    Landscape,
}

impl Orientation {
    /// Canvas size in pixels for this preset.
    pub const fn dimensions(&self) -> (u32, u32) {
        match self {
            Orientation::Portrait => (720, 1280),
            Orientation::Landscape => (1280, 720),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "portrait" | "vertical" | "9:16" => Ok(Orientation::Portrait),
            "landscape" | "horizontal" | "16:9" => Ok(Orientation::Landscape),
            _ => Err(ConfigError::UnknownOrientation(s.to_string())),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown orientation: {0}, expected 'portrait' or 'landscape'")]
    UnknownOrientation(String),
    #[error("Canvas dimensions must be non-zero, got {0}x{1}")]
    ZeroCanvas(u32, u32),
    #[error("Frame rate and sample rate must be non-zero")]
    ZeroRate,
    #[error("Narration speed {0} outside supported range 0.5-2.0")]
    SpeedOutOfRange(f64),
    #[error("Maximum zoom {0} must be at least 1.0")]
    InvalidZoom(f64),
    #[error("Duration cap must be positive, got {0}")]
    InvalidDuration(f64),
    #[error("Sentence character cap must be non-zero")]
    ZeroSentenceCap,
    #[error("Clip input cap must be non-zero")]
    ZeroClipCap,
}

/// Immutable configuration for one pipeline run.
///
/// Built once by the orchestrator and passed by reference into every
/// builder; nothing mutates it after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    /// Hard cap on the composed video length in seconds
    pub duration_cap_secs: f64,
    /// Narration tempo multiplier (1.0 = unchanged)
    pub narration_speed: f64,
    pub enable_zoompan: bool,
    /// Upper bound of the slow push-in zoom
    pub zoom_max: f64,
    /// Zoom increment per output frame
    pub zoom_step: f64,
    pub burn_subtitles: bool,
    /// Caption shown over the first seconds of the video
    pub hook_text: Option<String>,
    /// Substrings wrapped in emphasis markers in subtitle text
    pub keywords: Vec<String>,
    pub max_sentence_chars: usize,
    pub max_clip_inputs: usize,
    pub clip_repeat: usize,
    pub composition: EncodingConfig,
    pub final_mux: EncodingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::for_orientation(Orientation::Portrait)
    }
}

impl RenderConfig {
    /// Create the default configuration for an orientation preset.
    pub fn for_orientation(orientation: Orientation) -> Self {
        let (width, height) = orientation.dimensions();
        Self {
            width,
            height,
            fps: 60,
            sample_rate: 48_000,
            duration_cap_secs: 60.0,
            narration_speed: 1.2,
            enable_zoompan: true,
            zoom_max: 1.1,
            zoom_step: 0.0005,
            burn_subtitles: true,
            hook_text: None,
            keywords: Vec::new(),
            max_sentence_chars: DEFAULT_MAX_SENTENCE_CHARS,
            max_clip_inputs: DEFAULT_MAX_CLIP_INPUTS,
            clip_repeat: DEFAULT_CLIP_REPEAT,
            composition: EncodingConfig::for_composition(),
            final_mux: EncodingConfig::for_final_mux(),
        }
    }

    pub fn with_hook_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.hook_text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| !k.is_empty())
            .collect();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.narration_speed = speed;
        self
    }

    pub fn with_zoompan(mut self, enabled: bool) -> Self {
        self.enable_zoompan = enabled;
        self
    }

    pub fn with_duration_cap(mut self, secs: f64) -> Self {
        self.duration_cap_secs = secs;
        self
    }

    /// Canvas orientation derived from the dimensions.
    pub fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Target aspect ratio as width / height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroCanvas(self.width, self.height));
        }
        if self.fps == 0 || self.sample_rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if !(MIN_NARRATION_SPEED..=MAX_NARRATION_SPEED).contains(&self.narration_speed) {
            return Err(ConfigError::SpeedOutOfRange(self.narration_speed));
        }
        if self.zoom_max < 1.0 {
            return Err(ConfigError::InvalidZoom(self.zoom_max));
        }
        if self.duration_cap_secs <= 0.0 {
            return Err(ConfigError::InvalidDuration(self.duration_cap_secs));
        }
        if self.max_sentence_chars == 0 {
            return Err(ConfigError::ZeroSentenceCap);
        }
        if self.max_clip_inputs == 0 {
            return Err(ConfigError::ZeroClipCap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parse() {
        assert_eq!("portrait".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert_eq!("HORIZONTAL".parse::<Orientation>().unwrap(), Orientation::Landscape);
        assert_eq!("9:16".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert!("diagonal".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_presets() {
        let portrait = RenderConfig::for_orientation(Orientation::Portrait);
        assert_eq!((portrait.width, portrait.height), (720, 1280));
        assert_eq!(portrait.orientation(), Orientation::Portrait);

        let landscape = RenderConfig::for_orientation(Orientation::Landscape);
        assert_eq!((landscape.width, landscape.height), (1280, 720));
        assert_eq!(landscape.orientation(), Orientation::Landscape);
        assert!(landscape.aspect_ratio() > 1.0);
    }

    #[test]
    fn test_default_validates() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_speed_range() {
        let config = RenderConfig::default().with_speed(2.5);
        assert_eq!(config.validate(), Err(ConfigError::SpeedOutOfRange(2.5)));

        let config = RenderConfig::default().with_speed(1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_hook_is_none() {
        let config = RenderConfig::default().with_hook_text("   ");
        assert!(config.hook_text.is_none());

        let config = RenderConfig::default().with_hook_text("Learn it in 3s");
        assert_eq!(config.hook_text.as_deref(), Some("Learn it in 3s"));
    }

    #[test]
    fn test_keywords_drop_empty() {
        let config = RenderConfig::default().with_keywords(["", "deal", "boss"]);
        assert_eq!(config.keywords, vec!["deal".to_string(), "boss".to_string()]);
    }
}
