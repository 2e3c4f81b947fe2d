use std::fs;
use std::path::{Path, PathBuf};

use pqa_core::domain::{Document, PageText};
use pqa_core::error::AppError;
use tracing::{debug, info};

use crate::extract::TextExtractor;

/// A user-supplied file: display name plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let bytes = fs::read(path).map_err(|e| {
            AppError::new("UPLOAD_READ_FAILED", "Failed to read uploaded file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// File name to use inside the staging directory. Directory components are dropped.
fn staged_name(name: &str) -> Result<String, AppError> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            AppError::new("UPLOAD_INVALID", "Uploaded file has no usable name")
                .with_details(format!("name={name}"))
        })
}

/// Write the uploads into a scoped temporary directory and extract their page texts.
///
/// The directory is removed when this function returns, on success and on every error path.
pub fn stage_and_extract(
    files: &[UploadedFile],
    extractor: &dyn TextExtractor,
) -> Result<Vec<Document>, AppError> {
    if files.is_empty() {
        return Err(AppError::new("UPLOAD_MISSING", "No PDF files were supplied"));
    }

    let staging = tempfile::Builder::new()
        .prefix("procqa-upload-")
        .tempdir()
        .map_err(|e| {
            AppError::new("UPLOAD_STAGING_FAILED", "Failed to create temporary directory")
                .with_details(e.to_string())
        })?;
    debug!(dir = %staging.path().display(), files = files.len(), "staging uploads");

    let mut staged: Vec<(String, PathBuf)> = Vec::with_capacity(files.len());
    for (i, f) in files.iter().enumerate() {
        if !f.bytes.starts_with(b"%PDF") {
            return Err(AppError::new("UPLOAD_INVALID", "Uploaded file is not a PDF")
                .with_details(format!("name={}", f.name)));
        }
        // Index prefix keeps same-named uploads from overwriting each other.
        let path = staging
            .path()
            .join(format!("{i:03}-{}", staged_name(&f.name)?));
        fs::write(&path, &f.bytes).map_err(|e| {
            AppError::new("UPLOAD_STAGING_FAILED", "Failed to write uploaded file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        staged.push((f.name.clone(), path));
    }

    let mut docs = Vec::with_capacity(staged.len());
    for (name, path) in staged.iter() {
        let pages = extractor.extract_path(path).map_err(|e| {
            AppError::new("PDF_EXTRACT_FAILED", "Failed to extract text from PDF")
                .with_details(format!("name={}; err={}", name, e.to_user_string()))
        })?;
        docs.push(Document {
            name: name.clone(),
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| PageText {
                    page: i as u32,
                    text,
                })
                .collect(),
        });
    }

    info!(documents = docs.len(), "extracted uploaded documents");
    Ok(docs)
}
