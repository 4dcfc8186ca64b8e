//! Error types for text splitters

use thiserror::Error;

/// Errors that can occur when building or using a splitter
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid splitter configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Tokenizer could not be constructed
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

/// Result type for splitter operations
pub type Result<T> = std::result::Result<T, Error>;
