//! Keyword emphasis for subtitle text.

use regex::{Captures, Regex};
use vreel_models::{EMPHASIS_CLOSE, EMPHASIS_OPEN};

/// Wraps keyword occurrences in style-toggle directives.
///
/// All keywords are matched by one alternation, longest first, so at any
/// position the longest keyword wins and matches never overlap or nest.
#[derive(Debug, Clone, Default)]
pub struct Emphasizer {
    pattern: Option<Regex>,
}

impl Emphasizer {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        words.dedup();

        if words.is_empty() {
            return Self::default();
        }

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            pattern: Regex::new(&alternation).ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Wrap every keyword occurrence, scanning left to right.
    pub fn emphasize(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re
                .replace_all(text, |caps: &Captures| {
                    format!("{}{}{}", EMPHASIS_OPEN, &caps[0], EMPHASIS_CLOSE)
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}
