//! Document and chunk domain model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Detected type of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    PdfText,
    PdfScanned,
    Docx,
    Image,
}

impl DocumentType {
    /// Provisional type from a file extension. PDFs start as `PdfText`; the
    /// extractor reclassifies scanned ones.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::PdfText),
            "docx" => Some(Self::Docx),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfText => "PDF_TEXT",
            Self::PdfScanned => "PDF_SCANNED",
            Self::Docx => "DOCX",
            Self::Image => "IMAGE",
        }
    }
}

/// How the text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Text,
    Ocr,
}

/// Metadata derived during ingestion. Never mutated after the document is
/// successfully stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: u64,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub page_count: usize,
    pub method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_avg_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub low_confidence_pages: Vec<usize>,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// One indexed slice of a document.
///
/// Chunk ids are deterministic: `"{document_id}:{index}"`, with indices dense
/// from 0 in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: Uuid,
    pub index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChunkRecord {
    pub fn new(document_id: Uuid, index: usize, text: impl Into<String>) -> Self {
        Self {
            id: Self::chunk_id(document_id, index),
            document_id,
            index,
            text: text.into(),
            page: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Deterministic chunk identity.
    pub fn chunk_id(document_id: Uuid, index: usize) -> String {
        format!("{document_id}:{index}")
    }
}

/// A chunk returned from similarity search, with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    pub score: f32,
}
