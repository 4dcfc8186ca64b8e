//! Abstract embedding contract.

use async_trait::async_trait;

use crate::error::Result;

/// Embedding contract: `(texts[], model)` to `vectors[]` with
/// `vectors.len() == texts.len()`, element `i` corresponding to `texts[i]`.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed a batch of document texts, preserving input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::Error::upstream("embedding API returned no vector"))
    }

    /// Identifier of the underlying embedding model. Part of the cache key.
    fn model_id(&self) -> &str;
}
