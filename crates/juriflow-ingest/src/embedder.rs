//! Batched, cached embedding.
//!
//! Wraps any [`Embeddings`] provider with the on-disk cache and 100-text
//! batching. Rate-limited batches are retried with a long fixed backoff;
//! results always come back in the original input order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use juriflow::embeddings::Embeddings;
use juriflow::error::{Error, Result};

use crate::cache::EmbeddingCache;

/// Default batch size per embedding API call.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Default sleep between rate-limited attempts.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Default number of attempts per batch.
const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Caching, batching wrapper around an embedding provider.
pub struct CachedEmbedder {
    inner: Arc<dyn Embeddings>,
    cache: EmbeddingCache,
    batch_size: usize,
    max_attempts: usize,
    retry_backoff: Duration,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embeddings>, cache: EmbeddingCache) -> Self {
        Self {
            inner,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed `texts`, reporting `(done, total)` after the cache sweep and
    /// after each remote batch.
    pub async fn embed_documents_with_progress(
        &self,
        texts: &[String],
        on_progress: impl Fn(usize, usize),
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.inner.model_id().to_string();
        let mut results: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|text| self.cache.get(&EmbeddingCache::key(text, &model)))
            .collect();

        let miss_indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();
        let hits = texts.len() - miss_indices.len();
        debug!(total = texts.len(), hits, misses = miss_indices.len(), "embedding cache sweep");
        on_progress(hits, texts.len());

        let mut done = hits;
        for batch_indices in miss_indices.chunks(self.batch_size) {
            let batch_texts: Vec<String> = batch_indices
                .iter()
                .map(|&i| texts[i].clone())
                .collect();
            let vectors = self.embed_batch_with_retry(&batch_texts).await?;
            if vectors.len() != batch_texts.len() {
                return Err(Error::upstream(format!(
                    "embedding provider returned {} vectors for a batch of {}",
                    vectors.len(),
                    batch_texts.len()
                )));
            }
            for (&index, vector) in batch_indices.iter().zip(vectors) {
                self.cache
                    .put(&EmbeddingCache::key(&texts[index], &model), &vector, &model);
                results[index] = Some(vector);
            }
            done += batch_indices.len();
            on_progress(done, texts.len());
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| Error::internal("embedding slot left unfilled")))
            .collect()
    }

    async fn embed_batch_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                info!(attempt, backoff = ?self.retry_backoff, "rate limited, backing off before re-embedding batch");
                tokio::time::sleep(self.retry_backoff).await;
            }
            match self.inner.embed_documents(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(err @ Error::RateLimitExceeded(_)) => {
                    warn!(attempt, error = %err, "embedding batch rate limited");
                    last_error = Some(err);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::internal("retry loop exited without error")))
    }
}

#[async_trait]
impl Embeddings for CachedEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_documents_with_progress(texts, |_, _| {}).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.inner.model_id().to_string();
        let key = EmbeddingCache::key(text, &model);
        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }
        let vector = self.inner.embed_query(text).await?;
        self.cache.put(&key, &vector, &model);
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
#[path = "embedder_tests.rs"]
mod embedder_tests;
