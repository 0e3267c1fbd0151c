//! Server-side checks applied to every upload before it is staged.
//!
//! Clients filter by file type too, but that filter is a convenience only; these checks are the
//! ones that decide whether a file is relayed.

use crate::config::UploadsConfig;
use crate::errors::{Error, Result};

/// Leading bytes of every PDF document.
const PDF_MAGIC: &[u8] = b"%PDF-";

const OCTET_STREAM: &str = "application/octet-stream";

/// Acceptance rules derived from [`UploadsConfig`].
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_file_size: u64,
    allowed_mime_types: Vec<String>,
}

impl UploadPolicy {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_mime_types: config.allowed_mime_types.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Fails with [`Error::PayloadTooLarge`] once `size` bytes exceed the limit.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(Error::PayloadTooLarge {
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Decide the effective MIME type of an upload and check it against the allow-list.
    ///
    /// The part's declared content type wins; when it is absent or the generic
    /// `application/octet-stream`, the type is guessed from the file name. PDFs must also carry
    /// the PDF signature.
    pub fn check_type(&self, declared: Option<&str>, file_name: &str, content: &[u8]) -> Result<String> {
        let mime_type = effective_mime_type(declared, file_name);

        if !self.allowed_mime_types.iter().any(|allowed| allowed == &mime_type) {
            return Err(Error::UnsupportedMediaType { mime_type });
        }

        if mime_type == "application/pdf" && !content.starts_with(PDF_MAGIC) {
            return Err(Error::UnsupportedMediaType { mime_type });
        }

        Ok(mime_type)
    }
}

/// Strip parameters (`; charset=...`) and normalise case.
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn effective_mime_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(essence) {
        Some(mime) if !mime.is_empty() && mime != OCTET_STREAM => mime,
        _ => mime_guess::from_path(file_name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
    }
}
