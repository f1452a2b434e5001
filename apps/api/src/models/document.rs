use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An uploaded document as handed over by the upload layer. Consumed once.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Bytes,
    pub mime_type: String,
    /// Original filename, used only as an extension hint and for logging.
    pub filename: Option<String>,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Spreadsheet,
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub page_count: u32,
    pub has_images: bool,
    pub source_format: SourceFormat,
    pub extraction_duration_ms: u64,
    #[serde(rename = "usedFallbackOCR")]
    pub used_fallback_ocr: bool,
}

/// Sanitized plain text plus lightweight metadata. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

impl ExtractedText {
    /// Character count (not bytes); all size budgets are expressed in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A window over the extracted text. Offsets are byte offsets into the
/// source string and always fall on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub start_offset: usize,
    /// Bytes shared with the tail of the previous chunk (0 for the first).
    pub overlap_with_previous: usize,
    pub text: String,
}

#[cfg(test)]
impl TextChunk {
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.len()
    }
}
