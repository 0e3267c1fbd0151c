//! Access to the remote content-addressed pinning service.
//!
//! The relay handler depends only on the [`PinningService`] trait. The production implementation,
//! [`PinataClient`], is built once at startup from configuration and shared by every request
//! through [`crate::AppState`] for the lifetime of the process.

use async_trait::async_trait;
use std::path::Path;

pub mod pinata;

pub use pinata::PinataClient;

/// A file staged on local disk, ready to be pinned.
#[derive(Debug, Clone, Copy)]
pub struct PinRequest<'a> {
    /// Location of the staged bytes
    pub path: &'a Path,
    /// Name recorded in the pin's metadata (the file name the user uploaded)
    pub name: &'a str,
}

/// What the pinning service reports for a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedContent {
    /// Content identifier addressing the stored bytes
    pub cid: String,
    pub size: Option<u64>,
    pub timestamp: Option<String>,
}

/// A remote service that stores file content and returns its content identifier.
///
/// Implementations stream the staged file to the remote service. Any failure (authentication,
/// network, quota, malformed response) is reported as an error; callers treat them uniformly.
#[async_trait]
pub trait PinningService: Send + Sync {
    async fn pin_file(&self, request: PinRequest<'_>) -> anyhow::Result<PinnedContent>;
}
