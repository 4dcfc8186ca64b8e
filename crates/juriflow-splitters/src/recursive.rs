//! Recursive token-aware splitter.
//!
//! Tries a ladder of separators, from paragraph breaks down to single
//! characters, recursing into any piece that is still larger than the chunk
//! size. Adjacent chunks share up to `chunk_overlap` units of trailing
//! context.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::token::TokenCounter;
use crate::traits::{LengthFn, TextSplitter};

/// Separator ladder, tried in order. The empty string means
/// character-by-character splitting and always matches.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", ", ", " ", ""];

#[derive(Clone)]
struct SplitterConfig {
    chunk_size: usize,
    chunk_overlap: usize,
    length: LengthFn,
    strip_whitespace: bool,
}

impl SplitterConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Merge small splits into chunks that respect `chunk_size`, carrying up
    /// to `chunk_overlap` units of the previous window into the next chunk.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = (self.length)(separator);
        let mut docs = Vec::new();
        let mut window: VecDeque<usize> = VecDeque::new();
        let mut total = 0usize;

        for (idx, split) in splits.iter().enumerate() {
            let len = (self.length)(split);
            let sep_adjustment = if window.is_empty() { 0 } else { separator_len };

            if total + len + sep_adjustment > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        chunk_size = total,
                        max_chunk_size = self.chunk_size,
                        "created a chunk larger than the configured chunk size"
                    );
                }
                if !window.is_empty() {
                    if let Some(doc) = self.join_window(&window, splits, separator) {
                        docs.push(doc);
                    }
                    // Shrink the window until it fits the overlap budget and
                    // leaves room for the incoming split.
                    while total > self.chunk_overlap
                        || (total
                            + len
                            + if window.is_empty() { 0 } else { separator_len }
                            > self.chunk_size
                            && total > 0)
                    {
                        let Some(first) = window.pop_front() else { break };
                        let removed = (self.length)(&splits[first]);
                        let adj = if window.is_empty() { 0 } else { separator_len };
                        total = total.saturating_sub(removed + adj);
                    }
                }
            }

            window.push_back(idx);
            total += len + if window.len() > 1 { separator_len } else { 0 };
        }

        if !window.is_empty() {
            if let Some(doc) = self.join_window(&window, splits, separator) {
                docs.push(doc);
            }
        }

        docs
    }

    fn join_window(
        &self,
        window: &VecDeque<usize>,
        splits: &[String],
        separator: &str,
    ) -> Option<String> {
        let joined = window
            .iter()
            .map(|&i| splits[i].as_str())
            .collect::<Vec<_>>()
            .join(separator);
        let doc = if self.strip_whitespace {
            joined.trim().to_string()
        } else {
            joined
        };
        if doc.is_empty() {
            None
        } else {
            Some(doc)
        }
    }
}

/// A splitter that recursively tries paragraph, line, sentence, clause, word
/// and finally character boundaries, measuring length in tokens.
///
/// # Example
///
/// ```
/// use juriflow_splitters::{TextSplitter, TokenTextSplitter};
///
/// let splitter = TokenTextSplitter::cl100k()
///     .unwrap()
///     .with_chunk_size(100)
///     .with_chunk_overlap(10)
///     .build()
///     .unwrap();
///
/// let chunks = splitter.split_text("A paragraph.\n\nAnother paragraph.");
/// assert!(!chunks.is_empty());
/// ```
#[derive(Clone)]
pub struct TokenTextSplitter {
    config: SplitterConfig,
    separators: Vec<String>,
}

impl TokenTextSplitter {
    /// Splitter measuring with the given token counter.
    pub fn new(counter: &TokenCounter) -> Self {
        Self::with_length_fn(counter.length_fn())
    }

    /// Splitter over the `cl100k_base` vocabulary.
    pub fn cl100k() -> Result<Self> {
        Ok(Self::new(&TokenCounter::cl100k()?))
    }

    /// Splitter for the tokenizer of a specific embedding model.
    pub fn for_model(model: &str) -> Result<Self> {
        Ok(Self::new(&TokenCounter::for_model(model)?))
    }

    /// Splitter with a custom length function. Used by tests to measure in
    /// characters.
    pub fn with_length_fn(length: LengthFn) -> Self {
        Self {
            config: SplitterConfig {
                chunk_size: 500,
                chunk_overlap: 50,
                length,
                strip_whitespace: true,
            },
            separators: SEPARATORS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Set the target chunk size, in length-function units.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap carried between adjacent chunks.
    #[must_use]
    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Replace the separator ladder.
    #[must_use]
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Set whether chunk boundaries are trimmed.
    #[must_use]
    pub fn with_strip_whitespace(mut self, strip: bool) -> Self {
        self.config.strip_whitespace = strip;
        self
    }

    /// Validate the configuration.
    pub fn build(self) -> Result<Self> {
        self.config.validate()?;
        Ok(self)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator present in the text wins; the empty separator
        // always matches.
        let mut sep_idx = separators.len().saturating_sub(1);
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep.as_str()) {
                sep_idx = i;
                break;
            }
        }
        let empty = String::new();
        let separator = separators.get(sep_idx).unwrap_or(&empty);
        let remaining = if sep_idx + 1 < separators.len() {
            &separators[sep_idx + 1..]
        } else {
            &[]
        };

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator.as_str())
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        };

        let mut final_chunks = Vec::new();
        let mut good_splits = Vec::new();

        for split in splits {
            if (self.config.length)(&split) < self.config.chunk_size {
                good_splits.push(split);
            } else {
                if !good_splits.is_empty() {
                    final_chunks.extend(self.config.merge_splits(&good_splits, separator));
                    good_splits.clear();
                }
                if remaining.is_empty() {
                    final_chunks.push(split);
                } else {
                    final_chunks.extend(self.split_recursive(&split, remaining));
                }
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.config.merge_splits(&good_splits, separator));
        }

        final_chunks
    }
}

impl std::fmt::Debug for TokenTextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTextSplitter")
            .field("chunk_size", &self.config.chunk_size)
            .field("chunk_overlap", &self.config.chunk_overlap)
            .field("separators", &self.separators)
            .finish_non_exhaustive()
    }
}

impl TextSplitter for TokenTextSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.separators)
    }

    fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    fn chunk_overlap(&self) -> usize {
        self.config.chunk_overlap
    }
}

#[cfg(test)]
#[path = "recursive_tests.rs"]
mod recursive_tests;
