//! `OpenAI` embeddings provider.

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use async_trait::async_trait;

use juriflow::embeddings::Embeddings;
use juriflow::error::{Error, Result};

use crate::error_map::classify;

/// Embeddings through the `OpenAI` API.
///
/// One API call per invocation; batching, caching and rate-limit backoff
/// belong to the cached embedder in `juriflow-ingest`.
pub struct OpenAIEmbeddings {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: Option<u32>,
}

impl OpenAIEmbeddings {
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
            model: "text-embedding-ada-002".to_string(),
            dimensions: None,
        }
    }

    /// Set the embedding model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensionality (text-embedding-3 models only).
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

#[async_trait]
impl Embeddings for OpenAIEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::StringArray(texts.to_vec()),
            encoding_format: None,
            dimensions: self.dimensions,
            user: None,
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| classify(&e))?;

        if response.data.len() != texts.len() {
            return Err(Error::upstream(format!(
                "embedding API returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        // The API reports an index per vector; order by it so the result
        // aligns with the input slice.
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
