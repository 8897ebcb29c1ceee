//! Worker configuration.

use std::path::PathBuf;

use vreel_models::{ConfigError, Orientation, RenderConfig};

/// Keywords emphasized when none are configured.
pub const DEFAULT_KEYWORDS: [&str; 5] = ["押金", "跑刀", "老板", "风险", "速通"];

/// Paths and switches for one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch directory for intermediate artifacts
    pub work_dir: PathBuf,
    /// Final video destination
    pub output: PathBuf,
    /// Directory scanned for source clips
    pub clip_dir: PathBuf,
    /// Script file, or a directory of `.txt` scripts
    pub script_path: PathBuf,
    /// Background music file
    pub bgm_path: PathBuf,
    /// Optional ASS template file
    pub ass_template: Option<PathBuf>,
    pub orientation: Orientation,
    /// Narration speed multiplier
    pub speed: f64,
    pub zoompan: bool,
    pub burn_subtitles: bool,
    pub keywords: Vec<String>,
    /// Hook caption; defaults to the script file name
    pub hook_text: Option<String>,
    /// Use the HTTP TTS service; when off every sentence gets a placeholder tone
    pub tts_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("output/_work"),
            output: PathBuf::from("output/final.mp4"),
            clip_dir: PathBuf::from("input"),
            script_path: PathBuf::from("scripts"),
            bgm_path: PathBuf::from("assets/bgm.mp3"),
            ass_template: None,
            orientation: Orientation::Portrait,
            speed: 1.2,
            zoompan: true,
            burn_subtitles: true,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            hook_text: None,
            tts_enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults; an unknown
    /// orientation is an error so a typo never silently flips the canvas.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let orientation = match std::env::var("VREEL_ORIENTATION") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.orientation,
        };

        Ok(Self {
            work_dir: env_path("VREEL_WORK_DIR").unwrap_or(defaults.work_dir),
            output: env_path("VREEL_OUTPUT").unwrap_or(defaults.output),
            clip_dir: env_path("VREEL_CLIP_DIR").unwrap_or(defaults.clip_dir),
            script_path: env_path("VREEL_SCRIPT_PATH").unwrap_or(defaults.script_path),
            bgm_path: env_path("VREEL_BGM_PATH").unwrap_or(defaults.bgm_path),
            ass_template: env_path("VREEL_ASS_TEMPLATE"),
            orientation,
            speed: std::env::var("VREEL_SPEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.speed),
            zoompan: env_flag("VREEL_ZOOMPAN").unwrap_or(defaults.zoompan),
            burn_subtitles: env_flag("VREEL_BURN_SUBTITLES").unwrap_or(defaults.burn_subtitles),
            keywords: std::env::var("VREEL_KEYWORDS")
                .map(|s| parse_keywords(&s))
                .unwrap_or(defaults.keywords),
            hook_text: std::env::var("VREEL_HOOK_TEXT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            tts_enabled: env_flag("TTS_ENABLED").unwrap_or(defaults.tts_enabled),
        })
    }

    /// Build the immutable render configuration for one run.
    ///
    /// An explicit hook caption wins over `script_hook`.
    pub fn render_config(&self, script_hook: Option<&str>) -> Result<RenderConfig, ConfigError> {
        let mut render = RenderConfig::for_orientation(self.orientation)
            .with_speed(self.speed)
            .with_zoompan(self.zoompan)
            .with_keywords(self.keywords.iter().cloned());
        render.burn_subtitles = self.burn_subtitles;

        if let Some(hook) = self.hook_text.as_deref().or(script_hook) {
            render = render.with_hook_text(hook);
        }

        render.validate()?;
        Ok(render)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|s| parse_flag(&s))
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Comma-separated keyword list; both ASCII and full-width commas split.
pub fn parse_keywords(value: &str) -> Vec<String> {
    value
        .split([',', '，'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
