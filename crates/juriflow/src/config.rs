//! Environment-driven configuration.
//!
//! Every recognized option has a default except `LLM_API_KEY`, whose absence
//! aborts startup. Parsing failures name the offending variable.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Runtime settings for the whole service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the LLM / embedding provider. Required.
    pub llm_api_key: String,
    /// Chat model used by the coordinator, specialists and workflow steps.
    pub analysis_model: String,
    /// Embedding model used by the ingestion pipeline and RAG queries.
    pub embedding_model: String,
    /// Temperature for the coordinator and attorney agents.
    pub analysis_temperature: f32,
    /// Temperature for the technical expert agents.
    pub expert_temperature: f32,
    /// Target chunk size in tokens.
    pub chunk_max_tokens: usize,
    /// Chunk overlap in tokens. Must be smaller than `chunk_max_tokens`.
    pub chunk_overlap_tokens: usize,
    /// Maximum accepted upload size in megabytes.
    pub upload_max_mb: u64,
    /// Directory where uploaded raw files are stored.
    pub upload_temp_path: PathBuf,
    /// Directory backing the vector store.
    pub vector_store_path: PathBuf,
    /// Directory for the content-addressed embedding cache.
    pub embedding_cache_path: PathBuf,
    /// OCR language hint.
    pub ocr_language: String,
    /// Rendering resolution for OCR.
    pub ocr_dpi: u32,
    /// Pages with mean OCR confidence below this are flagged.
    pub ocr_low_conf_threshold: f32,
    /// Allowed CORS origins. Empty means permissive development mode.
    pub cors_origins: Vec<String>,
    /// Log filter directive for the subscriber.
    pub log_level: String,
    /// Per-LLM-call timeout.
    pub llm_call_timeout: Duration,
    /// Listen address for the HTTP server.
    pub server_addr: String,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `LLM_API_KEY` is absent, a numeric
    /// variable does not parse, or the chunk overlap is not smaller than the
    /// chunk size.
    pub fn from_env() -> Result<Self> {
        let llm_api_key = env_string("LLM_API_KEY")
            .ok_or_else(|| Error::config("LLM_API_KEY environment variable must be set"))?;

        let settings = Self {
            llm_api_key,
            analysis_model: env_string("LLM_ANALYSIS_MODEL").unwrap_or_else(|| "gpt-4".into()),
            embedding_model: env_string("LLM_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".into()),
            analysis_temperature: env_parse("LLM_ANALYSIS_TEMPERATURE", 0.3)?,
            expert_temperature: env_parse("LLM_EXPERT_TEMPERATURE", 0.2)?,
            chunk_max_tokens: env_parse("CHUNK_MAX_TOKENS", 500)?,
            chunk_overlap_tokens: env_parse("CHUNK_OVERLAP_TOKENS", 50)?,
            upload_max_mb: env_parse("UPLOAD_MAX_MB", 50)?,
            upload_temp_path: env_string("UPLOAD_TEMP_PATH")
                .map_or_else(|| PathBuf::from("data/uploads"), PathBuf::from),
            vector_store_path: env_string("VECTOR_STORE_PATH")
                .map_or_else(|| PathBuf::from("data/vector_store"), PathBuf::from),
            embedding_cache_path: env_string("EMBEDDING_CACHE_PATH")
                .map_or_else(|| PathBuf::from("data/cache_embeddings"), PathBuf::from),
            ocr_language: env_string("OCR_LANGUAGE").unwrap_or_else(|| "por".into()),
            ocr_dpi: env_parse("OCR_DPI", 300)?,
            ocr_low_conf_threshold: env_parse("OCR_LOW_CONF_THRESHOLD", 50.0)?,
            cors_origins: env_string("CORS_ORIGINS")
                .map(|csv| parse_csv(&csv))
                .unwrap_or_default(),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            llm_call_timeout: Duration::from_secs(env_parse("LLM_CALL_TIMEOUT_SECS", 60)?),
            server_addr: env_string("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_max_tokens == 0 {
            return Err(Error::config("CHUNK_MAX_TOKENS must be > 0"));
        }
        if self.chunk_overlap_tokens >= self.chunk_max_tokens {
            return Err(Error::config(format!(
                "CHUNK_OVERLAP_TOKENS ({}) must be smaller than CHUNK_MAX_TOKENS ({})",
                self.chunk_overlap_tokens, self.chunk_max_tokens
            )));
        }
        if self.upload_max_mb == 0 {
            return Err(Error::config("UPLOAD_MAX_MB must be > 0"));
        }
        Ok(())
    }

    /// Maximum accepted upload size in bytes.
    pub fn upload_max_bytes(&self) -> u64 {
        self.upload_max_mb * 1024 * 1024
    }

    /// Settings with every default filled in, for tests and tooling.
    pub fn for_tests() -> Self {
        Self {
            llm_api_key: "test-key".into(),
            analysis_model: "gpt-4".into(),
            embedding_model: "text-embedding-ada-002".into(),
            analysis_temperature: 0.3,
            expert_temperature: 0.2,
            chunk_max_tokens: 500,
            chunk_overlap_tokens: 50,
            upload_max_mb: 50,
            upload_temp_path: PathBuf::from("data/uploads"),
            vector_store_path: PathBuf::from("data/vector_store"),
            embedding_cache_path: PathBuf::from("data/cache_embeddings"),
            ocr_language: "por".into(),
            ocr_dpi: 300,
            ocr_low_conf_threshold: 50.0,
            cors_origins: Vec::new(),
            log_level: "info".into(),
            llm_call_timeout: Duration::from_secs(60),
            server_addr: "127.0.0.1:0".into(),
        }
    }
}

/// Read a non-empty string variable.
fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Read and parse a variable, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{name} is not valid: {e}"))),
        None => Ok(default),
    }
}

/// Split a CSV value into trimmed, non-empty entries.
fn parse_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
