// Extractor: document bytes -> sanitized plain text + metadata.
// Implements: MIME/extension dispatch, PDF (+OCR fallback), DOCX, spreadsheets, plain text.
// Everything here is blocking; callers run it inside tokio::task::spawn_blocking.

pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod sanitize;
pub mod spreadsheet;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::models::{ExtractedText, ExtractionMetadata, RawDocument, SourceFormat};

pub use ocr::{OcrEngine, TesseractOcr};
pub use sanitize::sanitize;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const MIME_TEXT: &str = "text/plain";

/// MIME types that say nothing about the content; the extension decides.
const GENERIC_MIME_TYPES: &[&str] = &["", "application/octet-stream", "binary/octet-stream"];

/// Characters per page when a format carries no page information.
const CHARS_PER_PAGE: usize = 3000;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported format (mime '{mime_type}', extension '{extension}')")]
    UnsupportedFormat {
        mime_type: String,
        extension: String,
    },

    #[error("corrupt {format:?} document: {reason}")]
    CorruptDocument {
        format: SourceFormat,
        reason: String,
    },

    #[error("OCR failed: {0}")]
    Ocr(String),
}

impl ExtractError {
    pub(crate) fn corrupt(format: SourceFormat, reason: impl Into<String>) -> Self {
        Self::CorruptDocument {
            format,
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct ExtractOptions {
    /// A PDF text layer shorter than this (in chars) is treated as image-only.
    pub min_pdf_text_chars: usize,
    /// OCR engine for image-only PDFs; `None` disables the fallback.
    pub ocr: Option<Arc<dyn OcrEngine>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_pdf_text_chars: 100,
            ocr: None,
        }
    }
}

/// Extracts sanitized text from an uploaded document. A readable document with
/// no text still succeeds with an empty string.
pub fn extract(doc: &RawDocument, options: &ExtractOptions) -> Result<ExtractedText, ExtractError> {
    let started = Instant::now();
    let format = detect_format(&doc.mime_type, doc.filename.as_deref())?;

    let raw = match format {
        SourceFormat::Pdf => pdf::extract_pdf(&doc.bytes, options)?,
        SourceFormat::Docx => docx::extract_docx(&doc.bytes)?,
        SourceFormat::Spreadsheet => spreadsheet::extract_spreadsheet(&doc.bytes)?,
        SourceFormat::PlainText => {
            let text = String::from_utf8_lossy(&doc.bytes).into_owned();
            RawExtraction {
                page_count: estimate_pages(&text),
                text,
                has_images: false,
                used_fallback_ocr: false,
            }
        }
    };

    let text = sanitize(&raw.text);
    let metadata = ExtractionMetadata {
        page_count: raw.page_count,
        has_images: raw.has_images,
        source_format: format,
        extraction_duration_ms: started.elapsed().as_millis() as u64,
        used_fallback_ocr: raw.used_fallback_ocr,
    };

    info!(
        format = ?format,
        pages = metadata.page_count,
        chars = text.chars().count(),
        ocr = metadata.used_fallback_ocr,
        duration_ms = metadata.extraction_duration_ms,
        "Extraction complete"
    );

    Ok(ExtractedText { text, metadata })
}

/// Output of one format backend, before sanitizing.
#[derive(Debug)]
pub(crate) struct RawExtraction {
    pub text: String,
    pub page_count: u32,
    pub has_images: bool,
    pub used_fallback_ocr: bool,
}

/// Resolves the source format from the declared MIME type, falling back to
/// the filename extension when the MIME type is absent or generic.
pub fn detect_format(mime_type: &str, filename: Option<&str>) -> Result<SourceFormat, ExtractError> {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let extension = filename
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let by_mime = match mime.as_str() {
        MIME_PDF => Some(SourceFormat::Pdf),
        MIME_DOCX => Some(SourceFormat::Docx),
        MIME_XLSX | MIME_XLS | MIME_ODS => Some(SourceFormat::Spreadsheet),
        MIME_TEXT => Some(SourceFormat::PlainText),
        _ => None,
    };
    if let Some(format) = by_mime {
        return Ok(format);
    }

    if GENERIC_MIME_TYPES.contains(&mime.as_str()) {
        let by_extension = match extension.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SourceFormat::Spreadsheet),
            "txt" => Some(SourceFormat::PlainText),
            _ => None,
        };
        if let Some(format) = by_extension {
            return Ok(format);
        }
    }

    Err(ExtractError::UnsupportedFormat {
        mime_type: mime,
        extension,
    })
}

pub(crate) fn estimate_pages(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_PAGE).max(1) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// Test fixtures
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;

    /// Minimal PDF with one text line per page. Builds the body then the xref
    /// with correct byte offsets so both lopdf and pdf-extract can parse it.
    pub(crate) fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
        let n = pages.len();
        // 1: catalog, 2: pages, 3: font, then (page, contents) pairs
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + i * 2)).collect();

        let mut out = Vec::new();
        let mut offsets = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        offsets.push(out.len());
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
                kids.join(" "),
                n
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );

        for (i, line) in pages.iter().enumerate() {
            let page_id = 4 + i * 2;
            let contents_id = page_id + 1;
            offsets.push(out.len());
            out.extend_from_slice(
                format!(
                    "{page_id} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                     /Contents {contents_id} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n"
                )
                .as_bytes(),
            );
            let stream = format!("BT /F1 12 Tf 72 700 Td ({line}) Tj ET");
            offsets.push(out.len());
            out.extend_from_slice(
                format!(
                    "{contents_id} 0 obj << /Length {} >> stream\n{stream}\nendstream endobj\n",
                    stream.len()
                )
                .as_bytes(),
            );
        }

        let size = offsets.len() + 1;
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in &offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(format!("trailer << /Size {size} /Root 1 0 R >>\nstartxref\n").as_bytes());
        out.extend_from_slice(format!("{xref_start}\n").as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    /// Minimal DOCX: one `w:p` per paragraph, plus any extra zip entries.
    pub(crate) fn minimal_docx(paragraphs: &[&str], extra_entries: &[(&str, &[u8])]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            for (name, bytes) in extra_entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(bytes).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    /// Minimal XLSX workbook with inline-string cells, one worksheet per
    /// `(name, rows)` pair. No shared strings or styles part.
    pub(crate) fn minimal_xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let sheet_entries: String = (1..=sheets.len())
            .map(|i| {
                format!(
                    "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" \
                     ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
                )
            })
            .collect();
        let content_types = format!(
            "<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Override PartName=\"/xl/workbook.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
             {sheet_entries}</Types>"
        );
        let root_rels = "<?xml version=\"1.0\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
             </Relationships>";

        let mut workbook_sheets = String::new();
        let mut workbook_rels = String::new();
        for (i, (name, _)) in sheets.iter().enumerate() {
            let n = i + 1;
            workbook_sheets.push_str(&format!(
                "<sheet name=\"{name}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>"
            ));
            workbook_rels.push_str(&format!(
                "<Relationship Id=\"rId{n}\" \
                 Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
                 Target=\"worksheets/sheet{n}.xml\"/>"
            ));
        }
        let workbook = format!(
            "<?xml version=\"1.0\"?><workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <sheets>{workbook_sheets}</sheets></workbook>"
        );
        let workbook_rels = format!(
            "<?xml version=\"1.0\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             {workbook_rels}</Relationships>"
        );

        let mut buf = Vec::new();
        {
            let options = zip::write::SimpleFileOptions::default();
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let parts = [
                ("[Content_Types].xml", content_types),
                ("_rels/.rels", root_rels.to_string()),
                ("xl/workbook.xml", workbook),
                ("xl/_rels/workbook.xml.rels", workbook_rels),
            ];
            for (name, xml) in parts {
                zip.start_file(name, options).unwrap();
                zip.write_all(xml.as_bytes()).unwrap();
            }
            for (i, (_, rows)) in sheets.iter().enumerate() {
                zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                    .unwrap();
                zip.write_all(worksheet_xml(rows).as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn worksheet_xml(rows: &[&[&str]]) -> String {
        let mut data = String::new();
        for (r, row) in rows.iter().enumerate() {
            let r = r + 1;
            data.push_str(&format!("<row r=\"{r}\">"));
            for (c, value) in row.iter().enumerate() {
                // single-letter columns are enough for fixtures
                let col = (b'A' + c as u8) as char;
                data.push_str(&format!(
                    "<c r=\"{col}{r}\" t=\"inlineStr\"><is><t>{value}</t></is></c>"
                ));
            }
            data.push_str("</row>");
        }
        format!(
            "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
             <sheetData>{data}</sheetData></worksheet>"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::{minimal_docx, minimal_pdf, minimal_xlsx};

    #[test]
    fn test_detect_by_mime() {
        assert_eq!(detect_format(MIME_PDF, None).unwrap(), SourceFormat::Pdf);
        assert_eq!(
            detect_format("application/pdf; charset=binary", None).unwrap(),
            SourceFormat::Pdf
        );
        assert_eq!(detect_format(MIME_DOCX, Some("cv.bin")).unwrap(), SourceFormat::Docx);
        assert_eq!(detect_format(MIME_ODS, None).unwrap(), SourceFormat::Spreadsheet);
    }

    #[test]
    fn test_generic_mime_falls_back_to_extension() {
        assert_eq!(
            detect_format("application/octet-stream", Some("Jane.CV.DOCX")).unwrap(),
            SourceFormat::Docx
        );
        assert_eq!(detect_format("", Some("cv.xlsx")).unwrap(), SourceFormat::Spreadsheet);
    }

    #[test]
    fn test_unsupported_combinations_fail_fast() {
        assert!(matches!(
            detect_format("image/png", Some("cv.pdf")),
            Err(ExtractError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format("application/octet-stream", Some("cv.doc")),
            Err(ExtractError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format("", None),
            Err(ExtractError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_extract_plain_text_is_sanitized() {
        let doc = RawDocument::new(&b"Jane   Doe\n\n\n\nLead developer ."[..], MIME_TEXT);
        let out = extract(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.text, "Jane Doe\n\nLead developer.");
        assert_eq!(out.metadata.page_count, 1);
        assert_eq!(out.metadata.source_format, SourceFormat::PlainText);
    }

    #[test]
    fn test_empty_text_document_still_succeeds() {
        let doc = RawDocument::new(&b"   "[..], MIME_TEXT);
        let out = extract(&doc, &ExtractOptions::default()).unwrap();
        assert!(out.text.is_empty());
    }

    #[test]
    fn test_extract_pdf_reports_pages() {
        let bytes = minimal_pdf(&["Jane Doe", "lead developer", "Acme Ltd"]);
        let doc = RawDocument::new(bytes, MIME_PDF);
        let out = extract(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.metadata.page_count, 3);
        assert!(out.text.contains("lead developer"));
        assert!(!out.metadata.has_images);
        assert!(!out.metadata.used_fallback_ocr);
    }

    #[test]
    fn test_extract_docx_via_extension() {
        let bytes = minimal_docx(&["Jane Doe", "Lead developer"], &[]);
        let doc = RawDocument::new(bytes, "application/octet-stream").with_filename("cv.docx");
        let out = extract(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.text, "Jane Doe\nLead developer");
        assert_eq!(out.metadata.source_format, SourceFormat::Docx);
    }

    #[test]
    fn test_extract_xlsx_flattens_sheets() {
        let skills: &[&[&str]] = &[&["Skill", "Years"], &["Rust", "6"], &["Go", "3"]];
        let history: &[&[&str]] = &[&["Acme Ltd", "Lead developer"]];
        let bytes = minimal_xlsx(&[("Skills", skills), ("History", history)]);
        let out = extract(&RawDocument::new(bytes, MIME_XLSX), &ExtractOptions::default()).unwrap();

        assert_eq!(out.metadata.source_format, SourceFormat::Spreadsheet);
        assert!(out.text.contains("=== Sheet: Skills ==="));
        assert!(out.text.contains("=== Sheet: History ==="));
        assert!(out.text.contains("Rust | 6"));
        assert!(out.text.contains("Acme Ltd | Lead developer"));
        assert_eq!(out.metadata.page_count, 1);
        assert!(!out.metadata.has_images);
    }

    #[test]
    fn test_extract_xlsx_page_count_follows_rows() {
        let lines: Vec<[String; 2]> = (0..75)
            .map(|i| [format!("Task {i}"), format!("{}", 2000 + i)])
            .collect();
        let cells: Vec<Vec<&str>> = lines
            .iter()
            .map(|l| l.iter().map(String::as_str).collect())
            .collect();
        let rows: Vec<&[&str]> = cells.iter().map(Vec::as_slice).collect();
        let bytes = minimal_xlsx(&[("Log", rows.as_slice())]);
        let out = extract(&RawDocument::new(bytes, MIME_XLSX), &ExtractOptions::default()).unwrap();
        assert_eq!(out.metadata.page_count, 2);
        assert!(out.text.contains("Task 74 | 2074"));
    }

    #[test]
    fn test_corrupt_pdf_is_reported() {
        let doc = RawDocument::new(&b"%PDF-1.4 this is not a pdf"[..], MIME_PDF);
        assert!(matches!(
            extract(&doc, &ExtractOptions::default()),
            Err(ExtractError::CorruptDocument {
                format: SourceFormat::Pdf,
                ..
            })
        ));
    }

    #[test]
    fn test_estimate_pages() {
        assert_eq!(estimate_pages(""), 1);
        assert_eq!(estimate_pages(&"a".repeat(3001)), 2);
    }
}
