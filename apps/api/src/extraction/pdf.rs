//! PDF text-layer extraction with an optional OCR fallback for scanned files.

use std::panic::{self, AssertUnwindSafe};

use lazy_static::lazy_static;
use regex::bytes::Regex;
use tracing::{debug, warn};

use super::{sanitize, ExtractError, ExtractOptions, RawExtraction};
use crate::models::SourceFormat;

lazy_static! {
    static ref IMAGE_XOBJECT: Regex =
        Regex::new(r"(?-u)/Subtype\s*/Image\b").expect("valid image marker regex");
}

pub(crate) fn extract_pdf(bytes: &[u8], options: &ExtractOptions) -> Result<RawExtraction, ExtractError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::corrupt(SourceFormat::Pdf, e.to_string()))?;
    let page_count = document.get_pages().len() as u32;
    let has_images = IMAGE_XOBJECT.is_match(bytes);

    let text_layer = extract_text_layer(bytes)?;
    let text_layer_chars = sanitize(&text_layer).chars().count();
    debug!(page_count, text_layer_chars, has_images, "PDF text layer read");

    let mut result = RawExtraction {
        text: text_layer,
        page_count,
        has_images,
        used_fallback_ocr: false,
    };

    if text_layer_chars >= options.min_pdf_text_chars {
        return Ok(result);
    }
    let Some(engine) = options.ocr.as_ref() else {
        debug!("Text layer below threshold and OCR disabled");
        return Ok(result);
    };

    match engine.recognize_pdf(bytes) {
        Ok(ocr_text) => {
            let ocr_chars = sanitize(&ocr_text).chars().count();
            debug!(engine = engine.name(), ocr_chars, "OCR finished");
            if ocr_chars > text_layer_chars {
                result.text = ocr_text;
                result.used_fallback_ocr = true;
            }
        }
        // The text layer (possibly empty) still stands.
        Err(e) => warn!(engine = engine.name(), error = %e, "OCR fallback failed"),
    }

    Ok(result)
}

/// pdf-extract panics on some malformed inputs instead of returning an error.
fn extract_text_layer(bytes: &[u8]) -> Result<String, ExtractError> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::corrupt(SourceFormat::Pdf, e.to_string())),
        Err(_) => Err(ExtractError::corrupt(
            SourceFormat::Pdf,
            "PDF parser aborted on malformed content",
        )),
    }
}
