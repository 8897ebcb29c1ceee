//! Subtitle cues and the narration timeline.

use serde::{Deserialize, Serialize};

/// Style-toggle directive opening an emphasized span.
pub const EMPHASIS_OPEN: &str = r"{\rEmph}";
/// Style-toggle directive returning to the default style.
pub const EMPHASIS_CLOSE: &str = r"{\rDefault}";

/// A timed subtitle interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, always greater than `start`
    pub end: f64,
    /// Display text, possibly containing emphasis directives
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered cues plus the duration of the narration track they describe.
///
/// `total_duration` covers every narrated segment and the pause after it,
/// so it is the last cue's end plus one inter-sentence pause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    cues: Vec<Cue>,
    total_duration: f64,
}

impl Timeline {
    pub fn new(cues: Vec<Cue>, total_duration: f64) -> Self {
        Self {
            cues,
            total_duration,
        }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Duration of the narration track in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// End of the last spoken cue, or 0.0 for an empty timeline.
    pub fn speech_end(&self) -> f64 {
        self.cues.last().map(|c| c.end).unwrap_or(0.0)
    }

    /// Cues start strictly increasing, never overlap, and each has positive length.
    pub fn is_well_formed(&self) -> bool {
        let positive = self.cues.iter().all(|c| c.start >= 0.0 && c.end > c.start);
        let ordered = self
            .cues
            .windows(2)
            .all(|w| w[1].start > w[0].start && w[1].start >= w[0].end);
        positive && ordered && self.total_duration >= self.speech_end()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}
