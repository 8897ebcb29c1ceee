//! Sentence segmentation for narration and subtitles.
//!
//! Text is first split at sentence-final punctuation. Units longer than the
//! character cap are re-split at commas and greedily packed back together,
//! joined by a full-width comma, so no unit exceeds the cap unless a single
//! comma-free fragment already does. Text is never truncated.

use vreel_models::render::DEFAULT_MAX_SENTENCE_CHARS;

/// Characters that end a sentence. `.` is handled separately.
const TERMINALS: &[char] = &['。', '！', '？', '!', '?', '…'];
/// Closing marks that stay attached to the sentence they end.
const CLOSERS: &[char] = &['”', '’', '"', '\'', '」', '』', '）', ')', '》'];
/// Clause separators used when a sentence is too long.
const COMMAS: &[char] = &['，', ',', '、'];
/// Connective inserted between packed fragments.
const CONNECTIVE: char = '，';

/// Splits script text into bounded-length units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    max_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENTENCE_CHARS)
    }
}

impl Segmenter {
    /// A cap of zero is treated as one.
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Segment a block of text. Output units are trimmed and never empty.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for sentence in split_sentences(text) {
            if char_len(&sentence) <= self.max_chars {
                out.push(sentence);
            } else {
                self.pack_fragments(&sentence, &mut out);
            }
        }
        out
    }

    /// Segment each line independently, preserving line order.
    pub fn segment_lines<'a, I>(&self, lines: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .flat_map(|line| self.segment(line))
            .collect()
    }

    fn pack_fragments(&self, sentence: &str, out: &mut Vec<String>) {
        let mut buf = String::new();
        let mut buf_len = 0usize;

        for fragment in sentence.split(COMMAS).map(str::trim).filter(|f| !f.is_empty()) {
            let len = char_len(fragment);

            if buf.is_empty() {
                buf.push_str(fragment);
                buf_len = len;
            } else if buf_len + 1 + len <= self.max_chars {
                buf.push(CONNECTIVE);
                buf.push_str(fragment);
                buf_len += 1 + len;
            } else {
                out.push(std::mem::take(&mut buf));
                buf.push_str(fragment);
                buf_len = len;
            }
        }

        if !buf.is_empty() {
            out.push(buf);
        }
    }
}

/// Split text at sentence-final punctuation, line by line.
///
/// Runs of terminal marks (`？！`, `……`) and trailing closing quotes stay
/// with the sentence they end. A `.` only ends a sentence when followed by
/// whitespace or the end of the line, so decimals survive.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    for line in text.lines() {
        let mut current = String::new();
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);

            let ends = TERMINALS.contains(&c)
                || (c == '.' && chars.peek().map_or(true, |n| n.is_whitespace()));
            if !ends {
                continue;
            }

            while let Some(&next) = chars.peek() {
                if TERMINALS.contains(&next) || CLOSERS.contains(&next) || next == '.' {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            flush(&mut current, &mut out);
        }
        flush(&mut current, &mut out);
    }

    out
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
