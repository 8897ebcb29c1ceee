//! Script text processing: sentence segmentation and keyword emphasis.

pub mod emphasis;
pub mod segmenter;

pub use emphasis::Emphasizer;
pub use segmenter::{split_sentences, Segmenter};
