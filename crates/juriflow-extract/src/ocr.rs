//! OCR pipeline over scanned PDFs and images.
//!
//! Rendering and recognition are external collaborators behind the
//! [`PageRenderer`] and [`OcrEngine`] traits; this module owns the per-page
//! loop, preprocessing, confidence accounting and page assembly.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::{debug, warn};

use juriflow::error::{Error, Result};

use crate::preprocess::preprocess_page;

/// One recognized word with the engine's confidence in `[0, 100]`.
/// Engines report undetected words with a negative confidence.
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Renders document pages to images at a given DPI.
pub trait PageRenderer: Send + Sync {
    fn render(&self, path: &Path, dpi: u32, page_limit: Option<usize>)
        -> Result<Vec<DynamicImage>>;
}

/// Recognizes text on one preprocessed page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, language: &str) -> Result<Vec<OcrWord>>;
}

/// Options for one OCR run.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub language: String,
    pub dpi: u32,
    pub preprocess: bool,
    pub page_limit: Option<usize>,
    /// Pages whose mean confidence falls below this are flagged.
    pub low_confidence_threshold: f32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "por".to_string(),
            dpi: 300,
            preprocess: true,
            page_limit: None,
            low_confidence_threshold: 50.0,
        }
    }
}

/// Result of an OCR run over a multi-page document.
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    /// Consolidated text with `--- PAGE N ---` headers.
    pub text: String,
    /// Raw text of each page, without headers.
    pub page_texts: Vec<String>,
    /// Mean word confidence per page.
    pub page_confidences: Vec<f32>,
    /// Zero-based indices of pages under the confidence threshold.
    pub low_confidence_pages: Vec<usize>,
    pub language: String,
}

impl OcrOutcome {
    /// Mean of the per-page confidences.
    pub fn average_confidence(&self) -> f32 {
        if self.page_confidences.is_empty() {
            return 0.0;
        }
        self.page_confidences.iter().sum::<f32>() / self.page_confidences.len() as f32
    }
}

/// Drives rendering, preprocessing and recognition page by page.
pub struct OcrProcessor {
    renderer: Arc<dyn PageRenderer>,
    engine: Arc<dyn OcrEngine>,
}

impl OcrProcessor {
    pub fn new(renderer: Arc<dyn PageRenderer>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { renderer, engine }
    }

    /// OCR a scanned PDF.
    pub fn ocr_pdf(&self, path: &Path, options: &OcrOptions) -> Result<OcrOutcome> {
        self.ocr_pdf_with_progress(path, options, |_, _| {})
    }

    /// OCR a scanned PDF, reporting `(pages_done, pages_total)` after each
    /// page so callers can surface mid-stage progress.
    pub fn ocr_pdf_with_progress(
        &self,
        path: &Path,
        options: &OcrOptions,
        on_page: impl Fn(usize, usize),
    ) -> Result<OcrOutcome> {
        let pages = self.renderer.render(path, options.dpi, options.page_limit)?;
        if pages.is_empty() {
            return Err(Error::corrupt_input("renderer produced no pages"));
        }
        let total = pages.len();

        let mut page_texts = Vec::with_capacity(total);
        let mut page_confidences = Vec::with_capacity(total);
        let mut low_confidence_pages = Vec::new();

        for (index, page) in pages.iter().enumerate() {
            let (text, confidence) = self.recognize_page(page, options)?;
            if confidence < options.low_confidence_threshold {
                warn!(
                    page = index + 1,
                    confidence, "page recognized below confidence threshold"
                );
                low_confidence_pages.push(index);
            }
            debug!(page = index + 1, confidence, "page recognized");
            page_texts.push(text);
            page_confidences.push(confidence);
            on_page(index + 1, total);
        }

        let text = assemble_pages(&page_texts);
        Ok(OcrOutcome {
            text,
            page_texts,
            page_confidences,
            low_confidence_pages,
            language: options.language.clone(),
        })
    }

    /// OCR a single image file. Returns the text and its mean confidence.
    pub fn ocr_image(&self, path: &Path, options: &OcrOptions) -> Result<(String, f32)> {
        let image = image::open(path)
            .map_err(|e| Error::corrupt_input(format!("failed to decode image: {e}")))?;
        self.recognize_page(&image, options)
    }

    fn recognize_page(
        &self,
        page: &DynamicImage,
        options: &OcrOptions,
    ) -> Result<(String, f32)> {
        let prepared = if options.preprocess {
            preprocess_page(page)
        } else {
            page.to_luma8()
        };
        let words = self.engine.recognize(&prepared, &options.language)?;
        Ok((join_words(&words), mean_confidence(&words)))
    }
}

/// Join detected words into page text, skipping undetected markers.
fn join_words(words: &[OcrWord]) -> String {
    words
        .iter()
        .filter(|w| w.confidence >= 0.0 && !w.text.trim().is_empty())
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mean confidence over detected words; undetected markers (negative
/// confidence) are excluded. A page with no detected words scores 0.
fn mean_confidence(words: &[OcrWord]) -> f32 {
    let detected: Vec<f32> = words
        .iter()
        .filter(|w| w.confidence >= 0.0)
        .map(|w| w.confidence)
        .collect();
    if detected.is_empty() {
        return 0.0;
    }
    detected.iter().sum::<f32>() / detected.len() as f32
}

/// Prefix every page with its `--- PAGE N ---` header.
fn assemble_pages(page_texts: &[String]) -> String {
    page_texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("--- PAGE {} ---\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
#[path = "ocr_tests.rs"]
mod ocr_tests;
