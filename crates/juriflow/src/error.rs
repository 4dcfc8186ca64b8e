//! Error taxonomy for `JuriFlow`.
//!
//! Background workers classify every failure into one of these variants and
//! record the [`Error::kind_tag`] on the owning job, so a failed job carries
//! both a human-readable message and a stable machine tag.

use thiserror::Error;

/// How many characters of a malformed model response are preserved for
/// debugging.
const PARSE_SNIPPET_LIMIT: usize = 500;

/// Error type shared across the JuriFlow workspace.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad input, rejected synchronously before any work is admitted.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unknown identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A result was polled before the job reached a terminal state.
    #[error("Result not ready: {0}")]
    TooEarly(String),

    /// Upstream rate limit persisted through every retry attempt.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Upstream call timed out after every retry attempt.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other upstream (LLM / embedding API) failure.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The model returned malformed output where strict JSON was required.
    #[error("Malformed model output: {message}")]
    ParseFailure {
        message: String,
        /// First 500 characters of the raw response.
        snippet: String,
    },

    /// The extractor or OCR stage could not read a specific file.
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    /// The file type is not one the pipeline knows how to ingest.
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector store failure.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invariant violation that has no better classification.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn too_early(msg: impl Into<String>) -> Self {
        Self::TooEarly(msg.into())
    }

    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimitExceeded(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Build a [`Error::ParseFailure`], truncating the raw response to the
    /// first 500 characters.
    pub fn parse_failure(message: impl Into<String>, raw: &str) -> Self {
        let snippet = raw.chars().take(PARSE_SNIPPET_LIMIT).collect();
        Self::ParseFailure {
            message: message.into(),
            snippet,
        }
    }

    pub fn corrupt_input(msg: impl Into<String>) -> Self {
        Self::CorruptInput(msg.into())
    }

    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn vector_store(msg: impl Into<String>) -> Self {
        Self::VectorStore(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine tag for job error records and logs.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::TooEarly(_) => "too_early",
            Self::RateLimitExceeded(_) => "rate_limit",
            Self::Timeout(_) => "timeout",
            Self::Upstream(_) => "upstream",
            Self::ParseFailure { .. } => "parse_failure",
            Self::CorruptInput(_) => "corrupt_input",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::Config(_) => "config",
            Self::VectorStore(_) => "vector_store",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the gateway retry loop should attempt the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_) | Self::Timeout(_))
    }
}

/// Result type alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
