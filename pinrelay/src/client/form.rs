//! Upload form state machine.
//!
//! [`UploadForm`] is the model behind the upload page: it owns the selected file, the busy flag
//! and the outcome of the last attempt. It performs no I/O; [`super::UploadController`] drives
//! it around an HTTP request.
//!
//! ```text
//!             valid pick                submit
//!   Idle ─────────────────▶ Ready ─────────────────▶ Uploading
//!    ▲  ◀── invalid pick ──   ▲                       │
//!    │                        │ valid pick / submit   ├──▶ Done(Success)
//!    └──── invalid pick ──────┴───────────────────────┴──▶ Done(Failure)
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use url::Url;

/// Shown when the picker hands over anything other than plain text or PDF.
pub const INVALID_FILE_MESSAGE: &str = "Please select a .txt or .pdf file.";

/// Shown when a failed upload carries no more specific message.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while uploading the file.";

/// Shown when the server answers `success: false` without an `error` field.
pub const UNSUCCESSFUL_UPLOAD_MESSAGE: &str = "Upload failed";

/// MIME types the picker accepts
pub const ACCEPTED_MIME_TYPES: [&str; 2] = ["text/plain", "application/pdf"];

/// A file handed over by the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub content: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension the way a browser
    /// file picker does.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string();

        Ok(Self::new(name, mime_type, content))
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether the picker filter lets this file through
    pub fn is_accepted(&self) -> bool {
        let essence = self.mime_type.split(';').next().unwrap_or_default().trim();
        ACCEPTED_MIME_TYPES
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(essence))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    Fiction,
    NonFiction,
    Poetry,
    Drama,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Genre::Fiction => "fiction",
            Genre::NonFiction => "non-fiction",
            Genre::Poetry => "poetry",
            Genre::Drama => "drama",
        };
        f.write_str(label)
    }
}

/// Descriptive fields collected alongside the file. They stay on the client; uploads carry
/// the file only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDetails {
    pub title: String,
    pub description: String,
    pub genre: Option<Genre>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// No valid file selected
    Idle,
    /// A valid file is selected and nothing is in flight
    Ready,
    Uploading,
    Done(UploadOutcome),
}

/// Everything the page renders.
///
/// After a completed attempt exactly one of `ipfs_hash` and `error` is set. Both are empty
/// before the first attempt and while `uploading` is true. `error` also carries the picker's
/// validation message, in which case `file` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadUiState {
    pub file: Option<SelectedFile>,
    pub uploading: bool,
    pub ipfs_hash: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    state: UploadUiState,
    details: StoryDetails,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a picker event. Returns whether the file was accepted.
    ///
    /// Any pick clears the previous result. A rejected file is dropped rather than kept, so it
    /// can never end up in a request. Picks are ignored while an upload is in flight.
    pub fn select_file(&mut self, file: SelectedFile) -> bool {
        if self.state.uploading {
            return false;
        }

        self.state.ipfs_hash = None;

        if file.is_accepted() {
            self.state.file = Some(file);
            self.state.error = None;
            true
        } else {
            self.state.file = None;
            self.state.error = Some(INVALID_FILE_MESSAGE.to_string());
            false
        }
    }

    pub fn details(&self) -> &StoryDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut StoryDetails {
        &mut self.details
    }

    /// Whether the submit control is enabled
    pub fn can_submit(&self) -> bool {
        !self.state.uploading && self.state.file.is_some()
    }

    /// Enter `Uploading` and hand out the file to send.
    ///
    /// Returns `None` (and changes nothing) when submit is disabled.
    pub fn begin_upload(&mut self) -> Option<SelectedFile> {
        if !self.can_submit() {
            return None;
        }

        let file = self.state.file.clone()?;
        self.state.uploading = true;
        self.state.ipfs_hash = None;
        self.state.error = None;
        Some(file)
    }

    pub fn complete_success(&mut self, ipfs_hash: impl Into<String>) {
        self.state.uploading = false;
        self.state.ipfs_hash = Some(ipfs_hash.into());
        self.state.error = None;
    }

    /// Record a failed attempt. An empty message is replaced by [`GENERIC_FAILURE_MESSAGE`].
    pub fn complete_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state.uploading = false;
        self.state.ipfs_hash = None;
        self.state.error = Some(if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        });
    }

    pub fn phase(&self) -> UploadPhase {
        let state = &self.state;
        match (&state.file, &state.ipfs_hash, &state.error) {
            _ if state.uploading => UploadPhase::Uploading,
            (Some(_), Some(_), _) => UploadPhase::Done(UploadOutcome::Success),
            (Some(_), None, Some(_)) => UploadPhase::Done(UploadOutcome::Failure),
            (Some(_), None, None) => UploadPhase::Ready,
            (None, _, _) => UploadPhase::Idle,
        }
    }

    pub fn state(&self) -> &UploadUiState {
        &self.state
    }

    /// Public gateway link for the last pinned file: `https://<gateway_host>/ipfs/<cid>`
    pub fn gateway_url(&self, gateway_host: &str) -> Option<Url> {
        let cid = self.state.ipfs_hash.as_deref()?;
        Url::parse(&format!("https://{}/ipfs/{}", gateway_host.trim_end_matches('/'), cid)).ok()
    }
}
