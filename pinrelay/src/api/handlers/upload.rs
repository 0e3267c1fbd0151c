use crate::AppState;
use crate::api::models::upload::PinResult;
use crate::errors::{Error, Result};
use crate::pinning::PinRequest;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::BytesMut;
use std::path::Path;
use uuid::Uuid;

/// Name reported to the pinning service when the file part carries no file name
const DEFAULT_FILE_NAME: &str = "upload";

/// A fully received `file` part
struct ReceivedFile {
    name: String,
    content_type: Option<String>,
    content: bytes::Bytes,
}

fn multipart_error(e: MultipartError, limit: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

/// Keep only the final path component of a client-reported file name.
fn base_name(reported: &str) -> String {
    let trimmed = reported.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        DEFAULT_FILE_NAME.to_string()
    } else {
        Path::new(trimmed)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string()
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "upload",
    summary = "Upload and pin a file",
    description = "Stage a single text or PDF file and pin it to IPFS through the pinning service. \
The multipart body must contain exactly one part named `file`.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form with a single `file` part"
    ),
    responses(
        (status = 200, description = "File pinned", body = PinResult),
        (status = 400, description = "No file part, or malformed multipart body", body = PinResult),
        (status = 413, description = "File exceeds the configured size limit", body = PinResult),
        (status = 415, description = "File type is not accepted", body = PinResult),
        (status = 500, description = "Staging or pinning failed", body = PinResult)
    )
)]
#[tracing::instrument(skip_all, fields(upload_id))]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PinResult>> {
    let upload_id = Uuid::new_v4();
    tracing::Span::current().record("upload_id", tracing::field::display(upload_id));

    // Bodies that are not multipart still get a JSON answer
    let mut multipart = multipart.map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })?;

    let limit = state.policy.max_file_size();
    let mut received: Option<ReceivedFile> = None;

    // Read the whole body before anything touches the scratch directory
    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            // Ignore unknown fields (forward compatibility)
            continue;
        }

        if received.is_some() {
            return Err(Error::BadRequest {
                message: "Exactly one 'file' part is allowed".to_string(),
            });
        }

        let name = field.file_name().map(base_name).unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        tracing::info!(filename = %name, content_type = ?content_type, "Receiving file");

        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            // Check size limit incrementally to fail fast
            state.policy.check_size((content.len() + chunk.len()) as u64)?;
            content.extend_from_slice(&chunk);
        }

        received = Some(ReceivedFile {
            name,
            content_type,
            content: content.freeze(),
        });
    }

    let file = received.ok_or(Error::MissingFile)?;
    let mime_type = state
        .policy
        .check_type(file.content_type.as_deref(), &file.name, &file.content)?;

    tracing::info!(
        filename = %file.name,
        mime_type = %mime_type,
        size_bytes = file.content.len(),
        "Accepted upload, staging"
    );

    let staged = state.scratch.stage(&file.content).await.map_err(Error::Staging)?;

    let pinned = state
        .pinner
        .pin_file(PinRequest {
            path: staged.path(),
            name: &file.name,
        })
        .await;

    // Released on both outcomes; the guard's Drop covers cancellation and panics
    staged.release().await;

    let pinned = pinned.map_err(Error::Relay)?;

    tracing::info!(filename = %file.name, cid = %pinned.cid, "File pinned");

    Ok(Json(PinResult::pinned(pinned.cid)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RELAY_FAILURE_MESSAGE;
    use crate::test_utils::{MockPinner, create_test_server, scratch_entries};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use std::future::IntoFuture;
    use std::sync::Arc;
    use std::time::Duration;

    fn text_part(content: &'static [u8], name: &str) -> Part {
        Part::bytes(content).file_name(name).mime_type("text/plain")
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a.txt"), "a.txt");
        assert_eq!(base_name("../../etc/passwd"), "passwd");
        assert_eq!(base_name("C:\\Users\\me\\story.pdf"), "story.pdf");
        assert_eq!(base_name(""), "upload");
        assert_eq!(base_name(".."), "upload");
        assert_eq!(base_name("dir/"), "upload");
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_success() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", text_part(b"hello txt\n", "a.txt")))
            .await;

        response.assert_status(StatusCode::OK);
        response.assert_json(&serde_json::json!({ "success": true, "ipfsHash": "Qm123" }));

        let calls = pinner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "a.txt");
        // The staged file held the uploaded bytes while the relay ran
        assert_eq!(calls[0].content, b"hello txt\n");
        // Staged under a token, not the user's file name
        assert!(calls[0].path.starts_with(scratch.path()));
        assert_ne!(calls[0].path.file_name().unwrap(), "a.txt");

        assert!(!calls[0].path.exists());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("title", "My story"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&serde_json::json!({ "success": false, "error": "No file uploaded" }));

        assert!(pinner.calls().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_non_multipart_body() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let response = server.post("/api/upload").text("hello").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: PinResult = serde_json::from_str(&response.text()).unwrap();
        assert!(!body.success);
        assert!(body.ipfs_hash.is_none());
        assert!(body.error.is_some_and(|e| !e.is_empty()));

        assert!(pinner.calls().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_relay_failure() {
        let pinner = Arc::new(MockPinner::failing("quota exceeded for account"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", text_part(b"hello", "a.txt")))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: PinResult = response.json();
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some(RELAY_FAILURE_MESSAGE));
        assert!(!response.text().contains("quota"));

        // The relay saw the staged file, and it was still cleaned up
        let calls = pinner.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].path.exists());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_staging_failure() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        // Scratch directory disappears underneath the running server
        std::fs::remove_dir_all(scratch.path()).unwrap();

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", text_part(b"hello", "a.txt")))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: PinResult = response.json();
        assert_eq!(body.error.as_deref(), Some(RELAY_FAILURE_MESSAGE));
        assert!(pinner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let part = Part::bytes(b"\x89PNG\r\n".as_slice()).file_name("cat.png").mime_type("image/png");
        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", part))
            .await;

        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: PinResult = response.json();
        assert!(!body.success);

        assert!(pinner.calls().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_accepts_pdf() {
        let pinner = Arc::new(MockPinner::returning("QmPdf"));
        let (server, _scratch) = create_test_server(pinner.clone()).await;

        let part = Part::bytes(b"%PDF-1.4\n%fake".as_slice())
            .file_name("story.pdf")
            .mime_type("application/pdf");
        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", part))
            .await;

        response.assert_status(StatusCode::OK);
        let body: PinResult = response.json();
        assert_eq!(body.ipfs_hash.as_deref(), Some("QmPdf"));
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        // Test config caps uploads at 1 KiB
        let big = vec![b'a'; 2048];
        let part = Part::bytes(big).file_name("big.txt").mime_type("text/plain");
        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", part))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(pinner.calls().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_second_file_part() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let response = server
            .post("/api/upload")
            .multipart(
                MultipartForm::new()
                    .add_part("file", text_part(b"one", "one.txt"))
                    .add_part("file", text_part(b"two", "two.txt")),
            )
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(pinner.calls().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_upload_ignores_extra_fields() {
        let pinner = Arc::new(MockPinner::returning("Qm123"));
        let (server, _scratch) = create_test_server(pinner.clone()).await;

        let response = server
            .post("/api/upload")
            .multipart(
                MultipartForm::new()
                    .add_text("title", "My story")
                    .add_text("genre", "poetry")
                    .add_part("file", text_part(b"roses", "poem.txt")),
            )
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(pinner.calls()[0].name, "poem.txt");
    }

    #[tokio::test]
    async fn test_concurrent_uploads_do_not_collide() {
        // Both relay calls must be in flight at the same time before either completes
        let pinner = Arc::new(MockPinner::returning("QmSame").with_rendezvous(2));
        let (server, scratch) = create_test_server(pinner.clone()).await;

        let first = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", text_part(b"first body", "same.txt")))
            .into_future();
        let second = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_part("file", text_part(b"second body", "same.txt")))
            .into_future();

        let (first, second) = tokio::time::timeout(Duration::from_secs(10), async { tokio::join!(first, second) })
            .await
            .expect("uploads deadlocked");

        first.assert_status(StatusCode::OK);
        second.assert_status(StatusCode::OK);

        let calls = pinner.calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].path, calls[1].path);

        // Each relay read its own request's bytes
        let mut contents: Vec<_> = calls.iter().map(|c| c.content.clone()).collect();
        contents.sort();
        assert_eq!(contents, vec![b"first body".to_vec(), b"second body".to_vec()]);

        assert_eq!(scratch_entries(&scratch), 0);
    }
}
