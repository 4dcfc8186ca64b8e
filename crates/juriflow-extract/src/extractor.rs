//! PDF and DOCX text extraction with scanned-document detection.

use std::io::Read;
use std::path::Path;

use lopdf::Document as PdfDocument;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use juriflow::documents::{DocumentType, ExtractionMethod};
use juriflow::error::{Error, Result};

/// Pages averaging fewer extracted characters than this are considered image
/// pages; a majority of them classifies the whole PDF as scanned.
const SCANNED_CHARS_PER_PAGE: usize = 100;

/// Result of text extraction for one file.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Full text, pages joined in order.
    pub text: String,
    /// Per-page text for formats with page structure; empty for DOCX.
    pub page_texts: Vec<String>,
    pub page_count: usize,
    pub detected_type: DocumentType,
    /// True when the PDF carries too little embedded text and needs OCR.
    pub is_scanned: bool,
    pub method: ExtractionMethod,
}

/// Extracts embedded text from PDF and DOCX files.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    scanned_chars_per_page: usize,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self {
            scanned_chars_per_page: SCANNED_CHARS_PER_PAGE,
        }
    }

    /// Override the scanned-detection threshold.
    #[must_use]
    pub fn with_scanned_threshold(mut self, chars_per_page: usize) -> Self {
        self.scanned_chars_per_page = chars_per_page;
        self
    }

    /// Extract text from `path`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`] for types this extractor does not handle
    /// (images go straight to OCR), [`Error::CorruptInput`] for files that
    /// cannot be parsed.
    pub fn extract(&self, path: &Path, declared: DocumentType) -> Result<ExtractedText> {
        match declared {
            DocumentType::PdfText | DocumentType::PdfScanned => self.extract_pdf(path),
            DocumentType::Docx => self.extract_docx(path),
            DocumentType::Image => Err(Error::unsupported_type(
                "images have no embedded text; use the OCR processor",
            )),
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<ExtractedText> {
        let doc = PdfDocument::load(path)
            .map_err(|e| Error::corrupt_input(format!("failed to parse PDF: {e}")))?;
        if doc.is_encrypted() {
            return Err(Error::corrupt_input("PDF is encrypted"));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(Error::corrupt_input("PDF has no pages"));
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            // A page that fails text extraction contributes an empty page;
            // that feeds the scanned classifier rather than failing the file.
            let text = doc.extract_text(&[*page_number]).unwrap_or_default();
            page_texts.push(normalize_whitespace(&text));
        }

        let sparse_pages = page_texts
            .iter()
            .filter(|t| t.chars().count() < self.scanned_chars_per_page)
            .count();
        let is_scanned = sparse_pages * 2 > page_texts.len();

        debug!(
            pages = page_texts.len(),
            sparse_pages, is_scanned, "classified PDF"
        );

        let text = page_texts.join("\n");
        Ok(ExtractedText {
            text,
            page_count: page_texts.len(),
            page_texts,
            detected_type: if is_scanned {
                DocumentType::PdfScanned
            } else {
                DocumentType::PdfText
            },
            is_scanned,
            method: ExtractionMethod::Text,
        })
    }

    fn extract_docx(&self, path: &Path) -> Result<ExtractedText> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| Error::corrupt_input(format!("failed to open DOCX archive: {e}")))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|_| Error::corrupt_input("DOCX is missing word/document.xml"))?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| Error::corrupt_input(format!("failed to read DOCX body: {e}")))?;

        let paragraphs = parse_docx_paragraphs(&xml)?;
        let text = paragraphs.join("\n");

        Ok(ExtractedText {
            text,
            page_texts: Vec::new(),
            page_count: 1,
            detected_type: DocumentType::Docx,
            is_scanned: false,
            method: ExtractionMethod::Text,
        })
    }
}

/// Walk `word/document.xml`, collecting the text runs (`w:t`) of each
/// paragraph (`w:p`) in order.
fn parse_docx_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"w:t" => in_text_run = false,
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => {
                let paragraph = current.trim().to_string();
                if !paragraph.is_empty() {
                    paragraphs.push(paragraph);
                }
                current.clear();
            }
            Ok(Event::Text(t)) if in_text_run => {
                let fragment = t
                    .unescape()
                    .map_err(|e| Error::corrupt_input(format!("bad DOCX text node: {e}")))?;
                current.push_str(&fragment);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::corrupt_input(format!(
                    "malformed DOCX document body: {e}"
                )))
            }
        }
    }

    Ok(paragraphs)
}

/// Collapse runs of whitespace so character counts reflect content, not PDF
/// layout artifacts.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod extractor_tests;
