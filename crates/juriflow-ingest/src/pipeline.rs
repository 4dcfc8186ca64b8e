//! The ingestion pipeline: extract, OCR when needed, chunk, embed, persist.
//!
//! `ingest` is a void background procedure; every outcome, success or
//! failure, lands on the upload job. Stage percents follow two tracks
//! depending on whether OCR runs, and never regress.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use juriflow::documents::{ChunkRecord, DocumentMetadata, DocumentType, ExtractionMethod};
use juriflow::error::{Error, Result};
use juriflow::vector_stores::VectorStore;
use juriflow_extract::{ExtractedText, OcrOptions, OcrProcessor, TextExtractor};
use juriflow_splitters::{TextSplitter, TokenTextSplitter};

use crate::embedder::CachedEmbedder;
use crate::upload_jobs::{UploadJobStore, UploadState};

/// Stage percents for the non-OCR track.
mod plain {
    pub const SAVED: u8 = 10;
    pub const DETECTED: u8 = 15;
    pub const EXTRACTED: u8 = 35;
    pub const CHUNKED: u8 = 50;
    pub const EMBED_START: u8 = 55;
    pub const EMBED_END: u8 = 70;
    pub const PERSIST_START: u8 = 75;
    pub const PERSIST_END: u8 = 95;
}

/// Stage percents for the OCR track.
mod scanned {
    pub const EXTRACTED: u8 = 30;
    pub const OCR_START: u8 = 30;
    pub const OCR_END: u8 = 60;
    pub const CHUNKED: u8 = 70;
    pub const EMBED_START: u8 = 75;
    pub const EMBED_END: u8 = 85;
    pub const PERSIST_START: u8 = 90;
    pub const PERSIST_END: u8 = 97;
}

/// Mid-stage embedding updates are only worth publishing past this many
/// chunks.
const EMBED_PROGRESS_MIN_CHUNKS: usize = 20;

/// Orchestrates one upload from raw file to vector store.
pub struct IngestionPipeline {
    extractor: TextExtractor,
    ocr: Option<Arc<OcrProcessor>>,
    ocr_options: OcrOptions,
    splitter: TokenTextSplitter,
    embedder: Arc<CachedEmbedder>,
    store: Arc<dyn VectorStore>,
    jobs: Arc<UploadJobStore>,
}

impl IngestionPipeline {
    pub fn new(
        splitter: TokenTextSplitter,
        embedder: Arc<CachedEmbedder>,
        store: Arc<dyn VectorStore>,
        jobs: Arc<UploadJobStore>,
    ) -> Self {
        Self {
            extractor: TextExtractor::new(),
            ocr: None,
            ocr_options: OcrOptions::default(),
            splitter,
            embedder,
            store,
            jobs,
        }
    }

    /// Wire up an OCR processor. Without one, scanned PDFs and images fail
    /// with a clear error instead of silently ingesting nothing.
    #[must_use]
    pub fn with_ocr(mut self, processor: Arc<OcrProcessor>, options: OcrOptions) -> Self {
        self.ocr = Some(processor);
        self.ocr_options = options;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn jobs(&self) -> Arc<UploadJobStore> {
        Arc::clone(&self.jobs)
    }

    /// Run the full ingestion for one admitted upload. Never returns an
    /// error: every failure is classified and recorded on the job.
    #[instrument(skip(self, path), fields(upload_id = %upload_id, name = %original_name))]
    pub async fn ingest(
        &self,
        upload_id: Uuid,
        path: PathBuf,
        original_name: String,
        declared: DocumentType,
    ) {
        match self.run(upload_id, &path, &original_name, declared).await {
            Ok(metadata) => {
                info!(document_id = %metadata.id, chunks = metadata.chunk_count, "ingestion completed");
                if let Err(e) = self.jobs.record_result(upload_id, metadata) {
                    warn!(error = %e, "could not record ingestion result");
                }
            }
            Err(err) => {
                error!(error = %err, tag = err.kind_tag(), "ingestion failed");
                if let Err(e) = self
                    .jobs
                    .record_error(upload_id, &err.to_string(), err.kind_tag())
                {
                    warn!(error = %e, "could not record ingestion error");
                }
            }
        }
    }

    async fn run(
        &self,
        upload_id: Uuid,
        path: &Path,
        original_name: &str,
        declared: DocumentType,
    ) -> Result<DocumentMetadata> {
        self.jobs.set_state(upload_id, UploadState::Saving)?;
        self.jobs
            .update_stage(upload_id, "Saving file on server", plain::SAVED)?;
        let size_bytes = tokio::fs::metadata(path).await?.len();

        self.jobs
            .update_stage(upload_id, "Detecting document type", plain::DETECTED)?;

        if declared == DocumentType::Image {
            return self
                .run_image(upload_id, path, original_name, size_bytes)
                .await;
        }

        let extractor = self.extractor.clone();
        let extract_path = path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || {
            extractor.extract(&extract_path, declared)
        })
        .await
        .map_err(|e| Error::internal(format!("extraction task failed: {e}")))??;

        if extracted.is_scanned {
            self.run_scanned(upload_id, path, original_name, size_bytes, &extracted)
                .await
        } else {
            self.run_plain(upload_id, path, original_name, size_bytes, extracted)
                .await
        }
    }

    /// Track for documents whose embedded text is usable as-is.
    async fn run_plain(
        &self,
        upload_id: Uuid,
        _path: &Path,
        original_name: &str,
        size_bytes: u64,
        extracted: ExtractedText,
    ) -> Result<DocumentMetadata> {
        self.jobs
            .update_stage(upload_id, "Extracting text", plain::EXTRACTED)?;

        let document_id = Uuid::new_v4();
        let chunks = self.build_chunks(document_id, &extracted.page_texts, &extracted.text);
        self.jobs.update_stage(
            upload_id,
            &format!("Text split into {} chunks", chunks.len()),
            plain::CHUNKED,
        )?;

        let chunk_count = self
            .embed_and_persist(
                upload_id,
                document_id,
                chunks,
                (plain::EMBED_START, plain::EMBED_END),
                (plain::PERSIST_START, plain::PERSIST_END),
            )
            .await?;

        Ok(DocumentMetadata {
            id: document_id,
            name: original_name.to_string(),
            size_bytes,
            doc_type: extracted.detected_type,
            page_count: extracted.page_count,
            method: ExtractionMethod::Text,
            ocr_avg_confidence: None,
            low_confidence_pages: Vec::new(),
            chunk_count,
            created_at: chrono::Utc::now(),
        })
    }

    /// Track for scanned PDFs: render, preprocess and recognize every page.
    async fn run_scanned(
        &self,
        upload_id: Uuid,
        path: &Path,
        original_name: &str,
        size_bytes: u64,
        extracted: &ExtractedText,
    ) -> Result<DocumentMetadata> {
        let Some(processor) = self.ocr.clone() else {
            return Err(Error::unsupported_type(
                "document is a scanned PDF and no OCR engine is configured",
            ));
        };

        self.jobs
            .update_stage(upload_id, "Extracting text", scanned::EXTRACTED)?;
        let pages_detected = extracted.page_count;
        self.jobs.update_stage(
            upload_id,
            &format!("OCR running ({pages_detected} pages detected)"),
            scanned::OCR_START,
        )?;

        let options = self.ocr_options.clone();
        let jobs = Arc::clone(&self.jobs);
        let ocr_path = path.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || {
            processor.ocr_pdf_with_progress(&ocr_path, &options, |done, total| {
                let span = u32::from(scanned::OCR_END - scanned::OCR_START);
                let pct =
                    scanned::OCR_START + ((done as u32 * span) / total.max(1) as u32) as u8;
                let _ = jobs.update_stage(
                    upload_id,
                    &format!("OCR running ({total} pages detected)"),
                    pct,
                );
            })
        })
        .await
        .map_err(|e| Error::internal(format!("OCR task failed: {e}")))??;

        let document_id = Uuid::new_v4();
        let chunks = self.build_chunks(document_id, &outcome.page_texts, &outcome.text);
        self.jobs.update_stage(
            upload_id,
            &format!("Text split into {} chunks", chunks.len()),
            scanned::CHUNKED,
        )?;

        let chunk_count = self
            .embed_and_persist(
                upload_id,
                document_id,
                chunks,
                (scanned::EMBED_START, scanned::EMBED_END),
                (scanned::PERSIST_START, scanned::PERSIST_END),
            )
            .await?;

        Ok(DocumentMetadata {
            id: document_id,
            name: original_name.to_string(),
            size_bytes,
            doc_type: DocumentType::PdfScanned,
            page_count: outcome.page_texts.len(),
            method: ExtractionMethod::Ocr,
            ocr_avg_confidence: Some(outcome.average_confidence()),
            low_confidence_pages: outcome.low_confidence_pages.clone(),
            chunk_count,
            created_at: chrono::Utc::now(),
        })
    }

    /// Track for single standalone images.
    async fn run_image(
        &self,
        upload_id: Uuid,
        path: &Path,
        original_name: &str,
        size_bytes: u64,
    ) -> Result<DocumentMetadata> {
        let Some(processor) = self.ocr.clone() else {
            return Err(Error::unsupported_type(
                "image uploads require an OCR engine",
            ));
        };

        self.jobs.update_stage(
            upload_id,
            "OCR running (1 page detected)",
            scanned::OCR_START,
        )?;

        let options = self.ocr_options.clone();
        let image_path = path.to_path_buf();
        let (text, confidence) =
            tokio::task::spawn_blocking(move || processor.ocr_image(&image_path, &options))
                .await
                .map_err(|e| Error::internal(format!("OCR task failed: {e}")))??;
        self.jobs.update_stage(
            upload_id,
            "OCR running (1 page detected)",
            scanned::OCR_END,
        )?;

        let document_id = Uuid::new_v4();
        let page_texts = vec![text];
        let chunks = self.build_chunks(document_id, &page_texts, "");
        self.jobs.update_stage(
            upload_id,
            &format!("Text split into {} chunks", chunks.len()),
            scanned::CHUNKED,
        )?;

        let chunk_count = self
            .embed_and_persist(
                upload_id,
                document_id,
                chunks,
                (scanned::EMBED_START, scanned::EMBED_END),
                (scanned::PERSIST_START, scanned::PERSIST_END),
            )
            .await?;

        let low_confidence = confidence < self.ocr_options.low_confidence_threshold;
        Ok(DocumentMetadata {
            id: document_id,
            name: original_name.to_string(),
            size_bytes,
            doc_type: DocumentType::Image,
            page_count: 1,
            method: ExtractionMethod::Ocr,
            ocr_avg_confidence: Some(confidence),
            low_confidence_pages: if low_confidence { vec![0] } else { Vec::new() },
            chunk_count,
            created_at: chrono::Utc::now(),
        })
    }

    /// Split text into ordered chunks. When page texts are available each
    /// chunk carries its 1-based page number; indices stay dense across
    /// pages.
    fn build_chunks(
        &self,
        document_id: Uuid,
        page_texts: &[String],
        full_text: &str,
    ) -> Vec<ChunkRecord> {
        let mut chunks = Vec::new();
        if page_texts.is_empty() {
            for text in self.splitter.split_text(full_text) {
                let index = chunks.len();
                chunks.push(ChunkRecord::new(document_id, index, text));
            }
        } else {
            for (page_idx, page) in page_texts.iter().enumerate() {
                for text in self.splitter.split_text(page) {
                    let index = chunks.len();
                    chunks.push(ChunkRecord::new(document_id, index, text).with_page(page_idx + 1));
                }
            }
        }
        chunks
    }

    async fn embed_and_persist(
        &self,
        upload_id: Uuid,
        document_id: Uuid,
        chunks: Vec<ChunkRecord>,
        (embed_start, embed_end): (u8, u8),
        (persist_start, persist_end): (u8, u8),
    ) -> Result<usize> {
        let chunk_count = chunks.len();
        self.jobs.update_stage(
            upload_id,
            &format!("Embedding {chunk_count} chunks"),
            embed_start,
        )?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let jobs = Arc::clone(&self.jobs);
        let embeddings = self
            .embedder
            .embed_documents_with_progress(&texts, move |done, total| {
                if total > EMBED_PROGRESS_MIN_CHUNKS {
                    let span = u32::from(embed_end - embed_start);
                    let pct = embed_start + ((done as u32 * span) / total.max(1) as u32) as u8;
                    let _ = jobs.update_stage(
                        upload_id,
                        &format!("Embedding {total} chunks"),
                        pct,
                    );
                }
            })
            .await?;
        self.jobs.update_stage(
            upload_id,
            &format!("Embedding {chunk_count} chunks"),
            embed_end,
        )?;

        self.jobs
            .update_stage(upload_id, "Storing in vector store", persist_start)?;
        self.store.upsert(document_id, chunks, embeddings).await?;
        self.jobs
            .update_stage(upload_id, "Storing in vector store", persist_end)?;

        Ok(chunk_count)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
