//! HTTP driver for the upload form.

use super::form::{GENERIC_FAILURE_MESSAGE, SelectedFile, UNSUCCESSFUL_UPLOAD_MESSAGE, UploadForm, UploadPhase};
use crate::api::models::upload::PinResult;
use crate::ensure_slash;
use anyhow::Context;
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Upload endpoint, relative to the relay's base URL
const UPLOAD_PATH: &str = "api/upload";

/// Sends the form's file to a relay server and records the outcome on the form.
///
/// `submit` takes `&mut self`, so one controller can never have two uploads in flight.
pub struct UploadController {
    form: UploadForm,
    client: Client,
    upload_url: Url,
    gateway_host: String,
}

impl UploadController {
    /// `server` is the relay's base URL; uploads go to `<server>/api/upload`.
    pub fn new(server: &Url, gateway_host: impl Into<String>) -> anyhow::Result<Self> {
        let upload_url = ensure_slash(server)
            .join(UPLOAD_PATH)
            .context("Failed to construct upload URL")?;
        let client = Client::builder().build().context("Failed to create HTTP client")?;

        Ok(Self {
            form: UploadForm::new(),
            client,
            upload_url,
            gateway_host: gateway_host.into(),
        })
    }

    pub fn form(&self) -> &UploadForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut UploadForm {
        &mut self.form
    }

    /// Read `path` and offer it to the form as a picker selection.
    pub async fn select_path(&mut self, path: &Path) -> std::io::Result<bool> {
        let file = SelectedFile::from_path(path).await?;
        Ok(self.form.select_file(file))
    }

    pub fn gateway_url(&self) -> Option<Url> {
        self.form.gateway_url(&self.gateway_host)
    }

    /// Upload the selected file and return the resulting phase.
    ///
    /// Does nothing when the form cannot submit. Otherwise the form always leaves `Uploading`,
    /// including when this future is dropped before the response arrives.
    #[instrument(skip_all, fields(url = %self.upload_url))]
    pub async fn submit(&mut self) -> UploadPhase {
        let Some(file) = self.form.begin_upload() else {
            debug!("Submit ignored: no valid file selected or upload already running");
            return self.form.phase();
        };

        let pending = PendingUpload {
            form: &mut self.form,
            settled: false,
        };

        match send_upload(&self.client, &self.upload_url, file).await {
            Ok(ipfs_hash) => {
                info!(cid = %ipfs_hash, "Upload pinned");
                pending.succeed(ipfs_hash);
            }
            Err(message) => {
                warn!("Upload failed: {}", message);
                pending.fail(message);
            }
        }

        self.form.phase()
    }
}

/// Holds the form while a request is in flight and settles it exactly once.
struct PendingUpload<'a> {
    form: &'a mut UploadForm,
    settled: bool,
}

impl PendingUpload<'_> {
    fn succeed(mut self, ipfs_hash: String) {
        self.settled = true;
        self.form.complete_success(ipfs_hash);
    }

    fn fail(mut self, message: String) {
        self.settled = true;
        self.form.complete_failure(message);
    }
}

impl Drop for PendingUpload<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.form.complete_failure(GENERIC_FAILURE_MESSAGE);
        }
    }
}

/// Perform one upload request.
///
/// The error message comes from the server's `error` field when the response carries one,
/// otherwise from the transport error, otherwise the generic fallback. A 2xx answer that is not
/// a successful `PinResult` counts as [`UNSUCCESSFUL_UPLOAD_MESSAGE`].
async fn send_upload(client: &Client, url: &Url, file: SelectedFile) -> Result<String, String> {
    let length = file.content.len() as u64;
    let part = Part::stream_with_length(Body::from(file.content), length)
        .file_name(file.name)
        .mime_str(&file.mime_type)
        .map_err(|e| transport_message(&e))?;
    let form = Form::new().part("file", part);

    let response = client
        .post(url.clone())
        .multipart(form)
        .send()
        .await
        .map_err(|e| transport_message(&e))?;

    let status_error = response.error_for_status_ref().err();
    let body = response.text().await.map_err(|e| transport_message(&e))?;

    match serde_json::from_str::<PinResult>(&body) {
        Ok(PinResult {
            success: true,
            ipfs_hash: Some(ipfs_hash),
            ..
        }) if status_error.is_none() => Ok(ipfs_hash),
        Ok(PinResult { error: Some(error), .. }) => Err(error),
        _ => match status_error {
            Some(e) => Err(transport_message(&e)),
            None => Err(UNSUCCESSFUL_UPLOAD_MESSAGE.to_string()),
        },
    }
}

fn transport_message(error: &reqwest::Error) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        GENERIC_FAILURE_MESSAGE.to_string()
    } else {
        message
    }
}
