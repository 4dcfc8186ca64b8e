use std::io::Write;
use std::path::PathBuf;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use juriflow::documents::{DocumentType, ExtractionMethod};
use juriflow::error::Error;

use crate::TextExtractor;

fn build_pdf(dir: &TempDir, name: &str, pages: &[&str]) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.path().join(name);
    doc.save(&path).unwrap();
    path
}

fn build_docx(dir: &TempDir, name: &str, paragraphs: &[&str]) -> PathBuf {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );

    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

const DENSE_PAGE: &str = "This employment agreement is made between the employer and the \
employee and sets out the duties, compensation, working hours, and termination conditions \
that govern the relationship between the parties for the duration of the contract.";

#[test]
fn text_pdf_extracts_pages_in_order() {
    let dir = TempDir::new().unwrap();
    let path = build_pdf(&dir, "contract.pdf", &[DENSE_PAGE, DENSE_PAGE]);

    let result = TextExtractor::new()
        .extract(&path, DocumentType::PdfText)
        .unwrap();
    assert_eq!(result.page_count, 2);
    assert_eq!(result.page_texts.len(), 2);
    assert!(!result.is_scanned);
    assert_eq!(result.detected_type, DocumentType::PdfText);
    assert_eq!(result.method, ExtractionMethod::Text);
    assert!(result.text.contains("employment agreement"));
}

#[test]
fn sparse_pdf_is_classified_scanned() {
    let dir = TempDir::new().unwrap();
    let path = build_pdf(&dir, "scan.pdf", &["x", "y", "z"]);

    let result = TextExtractor::new()
        .extract(&path, DocumentType::PdfText)
        .unwrap();
    assert!(result.is_scanned);
    assert_eq!(result.detected_type, DocumentType::PdfScanned);
    assert_eq!(result.page_count, 3);
}

#[test]
fn minority_sparse_pages_do_not_flag_scanned() {
    let dir = TempDir::new().unwrap();
    let path = build_pdf(&dir, "mixed.pdf", &[DENSE_PAGE, DENSE_PAGE, "x"]);

    let result = TextExtractor::new()
        .extract(&path, DocumentType::PdfText)
        .unwrap();
    assert!(!result.is_scanned);
}

#[test]
fn docx_paragraphs_extracted_in_order() {
    let dir = TempDir::new().unwrap();
    let path = build_docx(
        &dir,
        "petition.docx",
        &["First paragraph.", "Second paragraph.", "Third paragraph."],
    );

    let result = TextExtractor::new()
        .extract(&path, DocumentType::Docx)
        .unwrap();
    assert_eq!(result.detected_type, DocumentType::Docx);
    assert!(!result.is_scanned);
    let lines: Vec<&str> = result.text.lines().collect();
    assert_eq!(
        lines,
        vec!["First paragraph.", "Second paragraph.", "Third paragraph."]
    );
}

#[test]
fn docx_without_document_xml_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.docx");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("other.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"nothing").unwrap();
    writer.finish().unwrap();

    let err = TextExtractor::new()
        .extract(&path, DocumentType::Docx)
        .unwrap_err();
    assert!(matches!(err, Error::CorruptInput(_)));
}

#[test]
fn garbage_pdf_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"this is not a pdf at all").unwrap();

    let err = TextExtractor::new()
        .extract(&path, DocumentType::PdfText)
        .unwrap_err();
    assert!(matches!(err, Error::CorruptInput(_)));
}

#[test]
fn images_are_not_handled_here() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, b"png bytes").unwrap();

    let err = TextExtractor::new()
        .extract(&path, DocumentType::Image)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));
}

#[test]
fn whitespace_is_normalized_per_page() {
    assert_eq!(
        super::normalize_whitespace("a\n\n  b\t c  "),
        "a b c".to_string()
    );
    assert_eq!(super::normalize_whitespace(""), "");
}
