use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use juriflow::embeddings::Embeddings;
use juriflow::error::{Error, Result};

use crate::cache::EmbeddingCache;
use crate::embedder::CachedEmbedder;

/// Deterministic embedding: a 4-dim vector derived from the text bytes.
/// Counts remote calls and batch sizes; can fail the first N calls with a
/// rate limit.
struct FakeEmbeddings {
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    rate_limit_first: usize,
}

impl FakeEmbeddings {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            rate_limit_first: 0,
        }
    }

    fn rate_limited(first_calls: usize) -> Self {
        Self {
            rate_limit_first: first_calls,
            ..Self::new()
        }
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        vec![
            sum as f32,
            text.len() as f32,
            text.chars().count() as f32,
            1.0,
        ]
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.rate_limit_first {
            return Err(Error::rate_limit("429 from fake provider"));
        }
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn model_id(&self) -> &str {
        "fake-embedding-model"
    }
}

fn embedder(dir: &TempDir, fake: Arc<FakeEmbeddings>) -> CachedEmbedder {
    CachedEmbedder::new(fake, EmbeddingCache::new(dir.path()))
        .with_retry_backoff(Duration::from_millis(1))
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("chunk number {i}")).collect()
}

#[tokio::test]
async fn order_and_cardinality_are_preserved() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake));

    let input = texts(7);
    let vectors = embedder.embed_documents(&input).await.unwrap();
    assert_eq!(vectors.len(), input.len());
    for (text, vector) in input.iter().zip(&vectors) {
        assert_eq!(vector, &FakeEmbeddings::vector_for(text));
    }
}

#[tokio::test]
async fn second_call_hits_the_cache() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake));

    let input = vec!["same text".to_string()];
    let first = embedder.embed_documents(&input).await.unwrap();
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

    let second = embedder.embed_documents(&input).await.unwrap();
    // No additional remote call, byte-identical vector.
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn partial_cache_embeds_only_misses() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake));

    embedder
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    embedder
        .embed_documents(&["b".to_string(), "c".to_string(), "a".to_string()])
        .await
        .unwrap();

    let batches = fake.batch_sizes.lock().unwrap().clone();
    assert_eq!(batches, vec![2, 1]);
}

#[tokio::test]
async fn batches_are_capped() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake)).with_batch_size(10);

    embedder.embed_documents(&texts(25)).await.unwrap();
    let batches = fake.batch_sizes.lock().unwrap().clone();
    assert_eq!(batches, vec![10, 10, 5]);
}

#[tokio::test]
async fn rate_limit_is_retried_with_backoff() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::rate_limited(2));
    let embedder = embedder(&dir, Arc::clone(&fake));

    let vectors = embedder.embed_documents(&texts(3)).await.unwrap();
    assert_eq!(vectors.len(), 3);
    // Two rate-limited attempts plus the successful one.
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn persistent_rate_limit_surfaces_after_attempts() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::rate_limited(99));
    let embedder = embedder(&dir, Arc::clone(&fake)).with_max_attempts(3);

    let err = embedder.embed_documents(&texts(1)).await.unwrap_err();
    assert!(matches!(err, Error::RateLimitExceeded(_)));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn progress_reports_sweep_and_batches() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake)).with_batch_size(2);

    let seen: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
    embedder
        .embed_documents_with_progress(&texts(5), |done, total| {
            seen.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(0, 5), (2, 5), (4, 5), (5, 5)]);
}

#[tokio::test]
async fn empty_input_embeds_nothing() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake));

    let vectors = embedder.embed_documents(&[]).await.unwrap();
    assert!(vectors.is_empty());
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embed_query_uses_cache() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeEmbeddings::new());
    let embedder = embedder(&dir, Arc::clone(&fake));

    let first = embedder.embed_query("question").await.unwrap();
    let second = embedder.embed_query("question").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}
