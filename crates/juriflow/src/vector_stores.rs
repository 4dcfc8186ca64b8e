//! Vector store contract and the in-process implementation.
//!
//! The core depends on the [`VectorStore`] trait only; the in-memory store is
//! the single-process implementation. Swapping in an external store means
//! implementing the same four operations over its client.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::documents::{ChunkRecord, ScoredChunk};
use crate::error::{Error, Result};

/// Restricts a similarity search to a set of parent documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub document_ids: HashSet<Uuid>,
}

impl DocumentFilter {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            document_ids: ids.into_iter().collect(),
        }
    }

    pub fn matches(&self, document_id: Uuid) -> bool {
        self.document_ids.is_empty() || self.document_ids.contains(&document_id)
    }
}

/// CRUD and similarity search over `(chunk, embedding, metadata)`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store all chunks of a document in one atomic call.
    ///
    /// `chunks.len()` must equal `embeddings.len()`; chunk ids are
    /// `"{document_id}:{index}"`. Re-upserting a document replaces its
    /// previous chunks.
    async fn upsert(
        &self,
        document_id: Uuid,
        chunks: Vec<ChunkRecord>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()>;

    /// Top-`k` most similar chunks, optionally restricted to a document set.
    /// Returned chunks carry their parent document id.
    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// All chunks of one document, ordered by chunk index.
    async fn get_by_document(&self, document_id: Uuid) -> Result<Vec<ChunkRecord>>;

    /// Remove a document and all of its chunks (cascade by id prefix).
    async fn delete_document(&self, document_id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk: ChunkRecord,
    embedding: Arc<Vec<f32>>,
}

/// In-process vector store using cosine similarity (fixed metric).
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks, across all documents.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        document_id: Uuid,
        chunks: Vec<ChunkRecord>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::vector_store(format!(
                "chunk/embedding length mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dim = embeddings.first().map(Vec::len);
        if let Some(dim) = dim {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
                return Err(Error::vector_store(format!(
                    "inconsistent embedding dimensions: {} vs {}",
                    bad.len(),
                    dim
                )));
            }
        }

        let mut entries = self.entries.write();
        // Replace any previous version of this document.
        entries.retain(|_, stored| stored.chunk.document_id != document_id);
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            entries.insert(
                chunk.id.clone(),
                StoredChunk {
                    chunk,
                    embedding: Arc::new(embedding),
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        if query_embedding.is_empty() {
            return Err(Error::vector_store("query embedding is empty"));
        }

        let entries = self.entries.read();
        let mut scored: Vec<ScoredChunk> = Vec::new();
        for stored in entries.values() {
            if let Some(filter) = filter {
                if !filter.matches(stored.chunk.document_id) {
                    continue;
                }
            }
            if stored.embedding.len() != query_embedding.len() {
                return Err(Error::vector_store(format!(
                    "query dimension {} does not match stored dimension {}",
                    query_embedding.len(),
                    stored.embedding.len()
                )));
            }
            scored.push(ScoredChunk {
                chunk: stored.chunk.clone(),
                score: cosine_similarity(query_embedding, &stored.embedding),
            });
        }
        drop(entries);

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn get_by_document(&self, document_id: Uuid) -> Result<Vec<ChunkRecord>> {
        let entries = self.entries.read();
        let mut chunks: Vec<ChunkRecord> = entries
            .values()
            .filter(|stored| stored.chunk.document_id == document_id)
            .map(|stored| stored.chunk.clone())
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        let prefix = format!("{document_id}:");
        self.entries
            .write()
            .retain(|id, _| !id.starts_with(&prefix));
        Ok(())
    }
}

/// Cosine similarity; zero-magnitude vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
