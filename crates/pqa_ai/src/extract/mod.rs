use std::fs;
use std::path::Path;

use pqa_core::error::AppError;
use tracing::{debug, warn};

/// PDF bytes to page texts, in page order.
pub trait TextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, AppError>;

    fn extract_path(&self, path: &Path) -> Result<Vec<String>, AppError> {
        let bytes = fs::read(path).map_err(|e| {
            AppError::new("PDF_EXTRACT_FAILED", "Failed to read PDF file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        self.extract_text(&bytes)
    }
}

/// Extractor backed by `lopdf`'s content-stream text extraction.
#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn pages_of(doc: &lopdf::Document) -> Vec<String> {
        let mut out = Vec::new();
        for (page_no, _) in doc.get_pages() {
            match doc.extract_text(&[page_no]) {
                Ok(text) => out.push(text),
                Err(e) => {
                    // A page without decodable text still occupies its slot.
                    warn!(page = page_no, err = %e, "page text extraction failed");
                    out.push(String::new());
                }
            }
        }
        out
    }
}

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, AppError> {
        let doc = lopdf::Document::load_mem(pdf_bytes).map_err(|e| {
            AppError::new("PDF_EXTRACT_FAILED", "Failed to parse PDF document")
                .with_details(e.to_string())
        })?;
        let pages = Self::pages_of(&doc);
        debug!(pages = pages.len(), "extracted pdf text");
        Ok(pages)
    }

    fn extract_path(&self, path: &Path) -> Result<Vec<String>, AppError> {
        let doc = lopdf::Document::load(path).map_err(|e| {
            AppError::new("PDF_EXTRACT_FAILED", "Failed to parse PDF document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let pages = Self::pages_of(&doc);
        debug!(path = %path.display(), pages = pages.len(), "extracted pdf text");
        Ok(pages)
    }
}
