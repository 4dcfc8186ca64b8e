//! Document ingestion for `JuriFlow`.
//!
//! [`IngestionPipeline::ingest`] runs the background flow for one upload:
//! extract text (with OCR fallback for scanned PDFs), chunk, embed and
//! persist into the vector store, publishing progress to the
//! [`UploadJobStore`] at every stage.

mod cache;
mod embedder;
mod pipeline;
mod upload_jobs;

pub use cache::{CacheRecord, EmbeddingCache};
pub use embedder::CachedEmbedder;
pub use pipeline::IngestionPipeline;
pub use upload_jobs::{UploadJob, UploadJobStore, UploadState, UploadStats};
