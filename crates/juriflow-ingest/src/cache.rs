//! Content-addressed on-disk embedding cache.
//!
//! One JSON file per key under the cache directory. The key is
//! SHA-256(text + model id), so a hit is byte-identical to what a fresh API
//! call would return for the same pair. Writes are best-effort: a failed
//! write is logged and ingestion continues.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Payload persisted per cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub hash: String,
}

/// File-per-key embedding cache.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache key for a `(text, model)` pair.
    pub fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(model.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Look up a cached embedding. Any read or parse failure is treated as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let path = self.entry_path(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CacheRecord>(&raw) {
            Ok(record) => {
                debug!(key, "embedding cache hit");
                Some(record.embedding)
            }
            Err(e) => {
                warn!(key, error = %e, "unreadable embedding cache entry, treating as miss");
                None
            }
        }
    }

    /// Persist an embedding. Failures are logged and swallowed; the key is
    /// content-addressed, so last-write-wins is harmless.
    pub fn put(&self, key: &str, embedding: &[f32], model: &str) {
        let record = CacheRecord {
            embedding: embedding.to_vec(),
            timestamp: Utc::now(),
            model: model.to_string(),
            hash: key.to_string(),
        };
        if let Err(e) = self.write_record(key, &record) {
            warn!(key, error = %e, "failed to write embedding cache entry");
        }
    }

    fn write_record(&self, key: &str, record: &CacheRecord) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let payload = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.entry_path(key), payload)
    }
}
