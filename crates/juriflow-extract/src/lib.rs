//! Text extraction and OCR for `JuriFlow`.
//!
//! [`TextExtractor`] pulls text out of PDF and DOCX files and flags scanned
//! PDFs; [`OcrProcessor`] renders, preprocesses and recognizes scanned pages
//! through the [`PageRenderer`] and [`OcrEngine`] seams. The concrete
//! renderer and engine are external collaborators; this crate owns the
//! pipeline around them.

mod extractor;
mod ocr;
mod preprocess;

pub use extractor::{ExtractedText, TextExtractor};
pub use ocr::{OcrEngine, OcrOptions, OcrOutcome, OcrProcessor, OcrWord, PageRenderer};
pub use preprocess::preprocess_page;
