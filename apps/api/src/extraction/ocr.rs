//! OCR fallback for image-only PDFs.
//!
//! The shipped engine shells out to poppler's `pdftoppm` to rasterise pages
//! into a temporary directory and then runs `tesseract` on each page image.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::ExtractError;

/// Turns a scanned PDF into text. Implementations are blocking.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize_pdf(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub pdftoppm_bin: String,
    pub tesseract_bin: String,
    pub dpi: u32,
    pub max_pages: u32,
    pub language: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            pdftoppm_bin: "pdftoppm".to_string(),
            tesseract_bin: "tesseract".to_string(),
            dpi: 300,
            max_pages: 10,
            language: "eng".to_string(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_pdf(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let dir = tempfile::tempdir().map_err(|e| ExtractError::Ocr(format!("tempdir: {e}")))?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, bytes).map_err(|e| ExtractError::Ocr(format!("write input: {e}")))?;

        let prefix = dir.path().join("page");
        run(
            &self.pdftoppm_bin,
            &[
                "-r",
                &self.dpi.to_string(),
                "-l",
                &self.max_pages.to_string(),
                "-png",
                &path_arg(&input),
                &path_arg(&prefix),
            ],
        )?;

        let pages = page_images(dir.path())?;
        debug!(pages = pages.len(), "Rasterised PDF for OCR");

        let mut text = String::new();
        for page in pages {
            let page_text = run(
                &self.tesseract_bin,
                &[&path_arg(&page), "stdout", "-l", &self.language],
            )?;
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(page_text.trim());
        }
        Ok(text)
    }
}

fn run(bin: &str, args: &[&str]) -> Result<String, ExtractError> {
    let output = Command::new(bin).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::Ocr(format!("{bin} not found on PATH"))
        } else {
            ExtractError::Ocr(format!("failed to spawn {bin}: {e}"))
        }
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(format!(
            "{bin} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `pdftoppm` names pages `page-1.png`, `page-01.png`, ... depending on the
/// page count, so sort numerically by the suffix.
fn page_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExtractError::Ocr(format!("read dir: {e}")))?;
    let mut pages: Vec<(u32, PathBuf)> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter_map(|path| page_number(&path).map(|n| (n, path)))
        .collect();
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix("page-")?
        .parse()
        .ok()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
