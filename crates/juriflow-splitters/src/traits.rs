//! Core trait for text splitting

use std::sync::Arc;

/// Measures the length of a piece of text, in whatever unit the splitter is
/// configured for (tokens for production use, characters in some tests).
pub type LengthFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Core trait for text splitters.
pub trait TextSplitter {
    /// Split text into chunks.
    ///
    /// Guarantees: empty input yields an empty vector; chunk order reflects
    /// source order; each chunk measures at most `chunk_size` units (within
    /// tokenizer rounding at separator joins).
    fn split_text(&self, text: &str) -> Vec<String>;

    /// Target chunk size, in length-function units.
    fn chunk_size(&self) -> usize;

    /// Overlap carried between adjacent chunks, in length-function units.
    fn chunk_overlap(&self) -> usize;
}
