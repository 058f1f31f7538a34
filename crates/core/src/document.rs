//! Uploaded documents.
//!
//! Only `application/pdf` is accepted. Validation happens at construction,
//! so holding a [`PdfUpload`] means the type check already passed and the
//! extractor may be invoked.

use crate::error::{Error, Result};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const DEFAULT_TITLE: &str = "Research Paper";

/// A validated PDF upload.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl PdfUpload {
    /// Validate an upload by its declared media type.
    pub fn new(file_name: impl Into<String>, media_type: &str, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        if !media_type.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE) {
            return Err(Error::InvalidInput(format!(
                "'{file_name}' is not a PDF (got {media_type}); please upload a PDF file"
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput(format!("'{file_name}' is empty")));
        }
        Ok(Self { file_name, bytes })
    }

    /// Guess the media type from a file name, the way a file picker would.
    pub fn media_type_for(file_name: &str) -> &'static str {
        let is_pdf = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            PDF_MEDIA_TYPE
        } else {
            "application/octet-stream"
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &'static str {
        PDF_MEDIA_TYPE
    }

    /// Paper title derived from the file name: trailing `.pdf` removed.
    pub fn title(&self) -> String {
        title_from_file_name(&self.file_name)
    }
}

/// Derive a paper title from a file name.
pub fn title_from_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base,
    };
    if stem.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        stem.to_string()
    }
}
