//! ASS subtitle rendering.
//!
//! A template provides the header (canvas size, `Default` and `Emph`
//! styles) and an `{events}` placeholder; each cue becomes one `Dialogue`
//! line. Emphasis override tags in cue text are passed through untouched.

use std::path::Path;

use tracing::{debug, warn};
use vreel_models::Timeline;

use crate::error::MediaResult;

/// Placeholder replaced with the dialogue lines.
pub const EVENTS_PLACEHOLDER: &str = "{events}";

/// Bottom margin for portrait canvases, clear of platform UI.
const PORTRAIT_MARGIN_V: u32 = 400;
const LANDSCAPE_MARGIN_V: u32 = 50;

/// Far below one sample at any supported rate.
const HALF_CS_EPSILON: f64 = 1e-6;

/// Format seconds as ASS `H:MM:SS.CC`.
///
/// Centiseconds are rounded to nearest with decimal halves rounding up, carrying
/// into seconds/minutes/hours. Negative or non-finite input clamps to zero.
pub fn format_ass_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };
    // 1.005 is stored as 1.00499..., so nudge before rounding
    let total_cs = (seconds * 100.0 + HALF_CS_EPSILON).round() as u64;

    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;

    format!("{}:{:02}:{:02}.{:02}", h, m, s, cs)
}

/// Subtitle document template.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTemplate {
    text: String,
}

impl SubtitleTemplate {
    /// Built-in template sized for the canvas.
    ///
    /// Portrait canvases get a tall bottom margin, landscape a narrow one.
    pub fn builtin(width: u32, height: u32) -> Self {
        let margin_v = if height > width {
            PORTRAIT_MARGIN_V
        } else {
            LANDSCAPE_MARGIN_V
        };

        let text = format!(
            "[Script Info]\n\
             ScriptType: v4.00+\n\
             PlayResX: {width}\n\
             PlayResY: {height}\n\
             \n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
             Style: Default,Microsoft YaHei,50,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,1,0,0,0,100,100,0,0,1,2,0,2,20,20,{margin_v},1\n\
             Style: Emph,Microsoft YaHei,60,&H0000FFFF,&H000000FF,&H00000000,&H00000000,1,0,0,0,100,100,0,0,1,2,0,2,20,20,{margin_v},1\n\
             \n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
             {EVENTS_PLACEHOLDER}\n"
        );

        Self { text }
    }

    /// Use template text as given.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load a template file, falling back to the built-in template when the
    /// path is absent or unreadable. The result is retargeted to the canvas.
    pub async fn load(path: Option<&Path>, width: u32, height: u32) -> Self {
        let Some(path) = path else {
            return Self::builtin(width, height);
        };

        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded subtitle template");
                Self::from_text(text).retarget(width, height)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Subtitle template unreadable, using built-in"
                );
                Self::builtin(width, height)
            }
        }
    }

    /// Patch a portrait-authored template (720x1280) for a landscape canvas.
    ///
    /// Other templates are returned unchanged.
    pub fn retarget(self, width: u32, height: u32) -> Self {
        if width <= height || !self.text.contains("PlayResY: 1280") {
            return self;
        }

        let text = self
            .text
            .replace("PlayResX: 720", &format!("PlayResX: {}", width))
            .replace("PlayResY: 1280", &format!("PlayResY: {}", height))
            .replace(
                &format!(",{},1", PORTRAIT_MARGIN_V),
                &format!(",{},1", LANDSCAPE_MARGIN_V),
            );

        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the document for a timeline.
    ///
    /// Templates without a placeholder get the events appended.
    pub fn render(&self, timeline: &Timeline) -> String {
        let events = timeline
            .iter()
            .map(|cue| {
                format!(
                    "Dialogue: 0,{},{},Default,,0,0,0,,{}",
                    format_ass_time(cue.start),
                    format_ass_time(cue.end),
                    dialogue_text(&cue.text)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        if self.text.contains(EVENTS_PLACEHOLDER) {
            self.text.replacen(EVENTS_PLACEHOLDER, &events, 1)
        } else {
            let mut doc = self.text.clone();
            if !doc.ends_with('\n') {
                doc.push('\n');
            }
            doc.push_str(&events);
            doc.push('\n');
            doc
        }
    }
}

/// Render and write a subtitle document.
pub async fn write_subtitles(
    timeline: &Timeline,
    template: &SubtitleTemplate,
    path: &Path,
) -> MediaResult<()> {
    let doc = template.render(timeline);
    tokio::fs::write(path, doc).await?;
    debug!(path = %path.display(), cues = timeline.len(), "Wrote subtitles");
    Ok(())
}

/// Dialogue text must stay on one line; ASS hard breaks are `\N`.
fn dialogue_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\N")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vreel_models::{Cue, EMPHASIS_CLOSE, EMPHASIS_OPEN};

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(65.005), "0:01:05.01");
        assert_eq!(format_ass_time(1.005), "0:00:01.01");
        assert_eq!(format_ass_time(0.115), "0:00:00.12");
        assert_eq!(format_ass_time(1.004), "0:00:01.00");
        assert_eq!(format_ass_time(3600.0), "1:00:00.00");
        assert_eq!(format_ass_time(1.35), "0:00:01.35");
        assert_eq!(format_ass_time(59.999), "0:01:00.00");
        assert_eq!(format_ass_time(36000.5), "10:00:00.50");
        assert_eq!(format_ass_time(-2.0), "0:00:00.00");
    }

    #[test]
    fn test_builtin_margins() {
        let portrait = SubtitleTemplate::builtin(720, 1280);
        assert!(portrait.text().contains("PlayResY: 1280"));
        assert!(portrait.text().contains("20,20,400,1"));

        let landscape = SubtitleTemplate::builtin(1280, 720);
        assert!(landscape.text().contains("PlayResX: 1280"));
        assert!(landscape.text().contains("20,20,50,1"));
        assert!(!landscape.text().contains(",400,1"));
    }

    #[test]
    fn test_retarget_portrait_template() {
        let tpl = SubtitleTemplate::builtin(720, 1280).retarget(1280, 720);
        assert_eq!(tpl, SubtitleTemplate::builtin(1280, 720));

        let unchanged = SubtitleTemplate::builtin(720, 1280).retarget(720, 1280);
        assert_eq!(unchanged, SubtitleTemplate::builtin(720, 1280));
    }

    #[test]
    fn test_render_events_in_order() {
        let text = format!("{}你好{}", EMPHASIS_OPEN, EMPHASIS_CLOSE);
        let timeline = Timeline::new(
            vec![Cue::new(0.0, 0.6, text), Cue::new(0.75, 1.35, "世界")],
            1.5,
        );
        let doc = SubtitleTemplate::builtin(720, 1280).render(&timeline);

        let lines: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(
            lines,
            vec![
                "Dialogue: 0,0:00:00.00,0:00:00.60,Default,,0,0,0,,{\\rEmph}你好{\\rDefault}",
                "Dialogue: 0,0:00:00.75,0:00:01.35,Default,,0,0,0,,世界",
            ]
        );
        assert!(!doc.contains(EVENTS_PLACEHOLDER));
    }

    #[test]
    fn test_render_without_placeholder_appends() {
        let timeline = Timeline::new(vec![Cue::new(0.0, 1.0, "a\nb")], 1.15);
        let doc = SubtitleTemplate::from_text("[Events]").render(&timeline);
        assert_eq!(doc, "[Events]\nDialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,a\\Nb\n");
    }

    #[tokio::test]
    async fn test_load_missing_file_falls_back() {
        let tpl = SubtitleTemplate::load(Some(Path::new("/nonexistent/tpl.ass")), 1280, 720).await;
        assert_eq!(tpl, SubtitleTemplate::builtin(1280, 720));

        let tpl = SubtitleTemplate::load(None, 720, 1280).await;
        assert_eq!(tpl, SubtitleTemplate::builtin(720, 1280));
    }

    #[tokio::test]
    async fn test_write_and_load_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let tpl_path = dir.path().join("tpl.ass");
        tokio::fs::write(&tpl_path, "[Script Info]\nPlayResX: 720\nPlayResY: 1280\n[Events]\n{events}\n")
            .await
            .unwrap();

        let tpl = SubtitleTemplate::load(Some(&tpl_path), 1280, 720).await;
        assert!(tpl.text().contains("PlayResX: 1280"));

        let out = dir.path().join("out.ass");
        let timeline = Timeline::new(vec![Cue::new(0.0, 0.5, "hi")], 0.65);
        write_subtitles(&timeline, &tpl, &out).await.unwrap();

        let written = tokio::fs::read_to_string(&out).await.unwrap();
        assert!(written.contains("Dialogue: 0,0:00:00.00,0:00:00.50,Default,,0,0,0,,hi"));
    }
}
