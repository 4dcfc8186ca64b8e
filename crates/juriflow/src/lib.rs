//! Core contracts for `JuriFlow`.
//!
//! This crate holds everything the rest of the workspace builds on:
//!
//! - [`error`] - the workspace error taxonomy and `Result` alias
//! - [`config`] - environment-driven settings
//! - [`chat_models`] / [`embeddings`] - the abstract LLM and embedding
//!   contracts implemented by provider crates (`juriflow-openai`)
//! - [`gateway`] - the single chokepoint for LLM calls, with retry,
//!   timeout and usage accounting
//! - [`documents`] / [`opinions`] - the domain model shared across
//!   ingestion, agents and the HTTP surface
//! - [`vector_stores`] - the vector store contract plus the in-process
//!   cosine store

pub mod chat_models;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod error;
pub mod gateway;
pub mod opinions;
pub mod usage;
pub mod vector_stores;

pub use chat_models::{ChatMessage, ChatModel, ChatRequest, ChatResponse, Role, TokenUsage};
pub use config::Settings;
pub use documents::{
    ChunkRecord, DocumentMetadata, DocumentType, ExtractionMethod, ScoredChunk,
};
pub use embeddings::Embeddings;
pub use error::{Error, Result};
pub use gateway::{CompletionOutcome, CompletionRequest, LlmGateway};
pub use opinions::{AgentOpinion, ContextDocument};
pub use usage::{UsageSnapshot, UsageTracker};
pub use vector_stores::{DocumentFilter, InMemoryVectorStore, VectorStore};
