//! Upload client: the form model and the controller that submits it.
//!
//! [`UploadForm`] filters picker selections to plain text and PDF and tracks a single upload
//! attempt. [`UploadController`] posts the selected file to a relay's `/api/upload` endpoint and
//! records the [`PinResult`](crate::PinResult) on the form.

pub mod controller;
pub mod form;

pub use controller::UploadController;
pub use form::{Genre, SelectedFile, StoryDetails, UploadForm, UploadOutcome, UploadPhase, UploadUiState};
