//! `OpenAI`-backed providers for the JuriFlow chat and embedding contracts.
//!
//! Retry, backoff and usage accounting live in the core gateway and the
//! cached embedder; these types translate one request into one `OpenAI` API
//! call and classify provider failures into the core error taxonomy.

mod chat_models;
mod embeddings;
mod error_map;

pub use chat_models::OpenAIChatModel;
pub use embeddings::OpenAIEmbeddings;
