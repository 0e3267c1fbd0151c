use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of a single upload, returned verbatim to the client.
///
/// Exactly one of `ipfs_hash` / `error` is present: the content identifier on success, a
/// client-safe message otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PinResult {
    pub success: bool,
    /// Content identifier assigned by the pinning service
    #[serde(rename = "ipfsHash", default, skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PinResult {
    pub fn pinned(ipfs_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            ipfs_hash: Some(ipfs_hash.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            ipfs_hash: None,
            error: Some(error.into()),
        }
    }
}
