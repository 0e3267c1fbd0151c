//! Pinata pinning API client.

use super::{PinRequest, PinnedContent, PinningService};
use crate::config::PinataConfig;
use crate::ensure_slash;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use url::Url;

/// Path of the pin-file endpoint, relative to the API base URL
const PIN_FILE_PATH: &str = "pinning/pinFileToIPFS";

/// Response body of `pinFileToIPFS`
#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pin_size: Option<u64>,
    #[serde(rename = "Timestamp", default)]
    timestamp: Option<String>,
}

/// Metadata attached to a pin
#[derive(Debug, serde::Serialize)]
struct PinataMetadata<'a> {
    name: &'a str,
}

/// Streams staged files to Pinata over HTTP.
pub struct PinataClient {
    client: Client,
    pin_file_url: Url,
    jwt: String,
    request_timeout: Option<Duration>,
}

impl PinataClient {
    pub fn new(config: &PinataConfig) -> anyhow::Result<Self> {
        let jwt = config.jwt.clone().context("Pinata JWT is not configured")?;
        let client = Client::builder().build().context("Failed to create HTTP client")?;
        let pin_file_url = ensure_slash(&config.api_url)
            .join(PIN_FILE_PATH)
            .map_err(|e| anyhow!("Failed to construct pin URL: {}", e))?;

        Ok(Self {
            client,
            pin_file_url,
            jwt,
            request_timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl PinningService for PinataClient {
    #[instrument(skip_all, fields(path = %request.path.display(), name = request.name))]
    async fn pin_file(&self, request: PinRequest<'_>) -> anyhow::Result<PinnedContent> {
        let file = tokio::fs::File::open(request.path)
            .await
            .with_context(|| format!("Failed to open staged file {}", request.path.display()))?;
        let length = file.metadata().await?.len();

        let file_part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(request.name.to_string());
        let metadata = serde_json::to_string(&PinataMetadata { name: request.name })?;
        let form = Form::new()
            .part("file", file_part)
            .part("pinataMetadata", Part::text(metadata).mime_str("application/json")?);

        debug!("Pinning {} bytes via {}", length, self.pin_file_url);

        let mut builder = self.client.post(self.pin_file_url.clone()).bearer_auth(&self.jwt).multipart(form);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.context("Failed to reach Pinata API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Pinata API rejected pin request");
            return Err(anyhow!("Pinata API error: {} - {}", status, body));
        }

        // Get the response body as text first for logging
        let body_text = response.text().await?;
        tracing::debug!("Pinata response body: {}", body_text);

        let parsed: PinFileResponse = serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!("Failed to parse Pinata response as JSON. Error: {}", e);
            anyhow!("error decoding response body: {}", e)
        })?;

        Ok(PinnedContent {
            cid: parsed.ipfs_hash,
            size: parsed.pin_size,
            timestamp: parsed.timestamp,
        })
    }
}
