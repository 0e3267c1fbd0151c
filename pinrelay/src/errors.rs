use crate::api::models::upload::PinResult;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Message returned to clients for every staging or relay failure. The underlying cause is
/// only logged.
pub const RELAY_FAILURE_MESSAGE: &str = "Error uploading to IPFS";

#[derive(ThisError, Debug)]
pub enum Error {
    /// The multipart body carried no `file` part
    #[error("No file uploaded")]
    MissingFile,

    /// Malformed request data
    #[error("{message}")]
    BadRequest { message: String },

    /// File type outside the accepted set
    #[error("Unsupported media type: {mime_type}")]
    UnsupportedMediaType { mime_type: String },

    /// File larger than the configured limit
    #[error("File exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Writing the upload to scratch storage failed
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    /// The pinning service rejected the file or could not be reached
    #[error("Failed to pin file: {0:#}")]
    Relay(#[source] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFile | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Staging(_) | Error::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingFile => "No file uploaded".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::UnsupportedMediaType { .. } => "Only .txt and .pdf files are accepted".to_string(),
            Error::PayloadTooLarge { limit } => format!("File exceeds the maximum size of {limit} bytes"),
            Error::Staging(_) | Error::Relay(_) => RELAY_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Staging(_) | Error::Relay(_) => {
                tracing::error!("Error uploading to IPFS: {:#}", self);
            }
            Error::UnsupportedMediaType { .. } | Error::PayloadTooLarge { .. } => {
                tracing::info!("Rejected upload: {}", self);
            }
            Error::MissingFile | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(PinResult::failed(self.user_message()))).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
