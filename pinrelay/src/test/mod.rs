use crate::Application;
use crate::client::{SelectedFile, UploadController, UploadOutcome, UploadPhase};
use crate::test_utils::{create_test_config, pinata_config};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tracing::info;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RunningRelay {
    url: Url,
    scratch: TempDir,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl RunningRelay {
    /// Serve a real relay on an ephemeral port, pinning through `pinata_url`.
    async fn start(pinata_url: &str) -> Self {
        let scratch = TempDir::new().expect("Failed to create scratch dir");
        let mut config = create_test_config(scratch.path().to_path_buf());
        config.pinata = pinata_config(pinata_url);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();

        let app = Application::new(config).await.expect("Failed to create application");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(app.serve_on(listener, async {
            let _ = rx.await;
        }));

        info!("Relay listening on {}", url);

        Self {
            url,
            scratch,
            shutdown: Some(tx),
            handle,
        }
    }

    fn scratch_entries(&self) -> usize {
        crate::test_utils::scratch_entries(&self.scratch)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("server task panicked").expect("server failed");
    }
}

/// End-to-end: the controller uploads a 10-byte text file through a live relay to a mocked
/// Pinata API and ends with the identifier and gateway link on display.
#[test_log::test(tokio::test)]
async fn test_e2e_upload_text_file() {
    let pinata = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("authorization", "Bearer test-jwt"))
        .and(body_string_contains("filename=\"a.txt\""))
        .and(body_string_contains("hello txt\n"))
        .and(body_string_contains(r#"{"name":"a.txt"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "Qm123",
            "PinSize": 10,
            "Timestamp": "2024-05-01T12:00:00.000Z"
        })))
        .expect(1)
        .mount(&pinata)
        .await;

    let relay = RunningRelay::start(&pinata.uri()).await;

    let mut controller = UploadController::new(&relay.url, "gateway.test").unwrap();
    let file = SelectedFile::new("a.txt", "text/plain", &b"hello txt\n"[..]);
    assert_eq!(file.size(), 10);
    assert!(controller.form_mut().select_file(file));
    assert_eq!(controller.form().phase(), UploadPhase::Ready);

    let phase = controller.submit().await;

    assert_eq!(phase, UploadPhase::Done(UploadOutcome::Success));
    let state = controller.form().state();
    assert!(!state.uploading);
    assert_eq!(state.ipfs_hash.as_deref(), Some("Qm123"));
    assert!(state.error.is_none());

    let link = controller.gateway_url().expect("gateway link");
    assert!(link.as_str().contains("Qm123"));
    assert_eq!(link.as_str(), "https://gateway.test/ipfs/Qm123");

    assert_eq!(relay.scratch_entries(), 0, "staged file should be removed");
    relay.stop().await;
}

/// End-to-end: a Pinata rejection reaches the controller only as the generic relay message.
#[test_log::test(tokio::test)]
async fn test_e2e_pinata_failure() {
    let pinata = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded for account 42"))
        .mount(&pinata)
        .await;

    let relay = RunningRelay::start(&pinata.uri()).await;

    let mut controller = UploadController::new(&relay.url, "gateway.test").unwrap();
    controller
        .form_mut()
        .select_file(SelectedFile::new("a.txt", "text/plain", &b"hello txt\n"[..]));

    assert_eq!(controller.submit().await, UploadPhase::Done(UploadOutcome::Failure));
    let state = controller.form().state();
    assert!(!state.uploading);
    assert!(state.ipfs_hash.is_none());
    assert_eq!(state.error.as_deref(), Some(crate::errors::RELAY_FAILURE_MESSAGE));
    assert!(controller.gateway_url().is_none());

    assert_eq!(relay.scratch_entries(), 0, "staged file should be removed");
    relay.stop().await;
}

/// The relay re-checks the file type even when a client skips the picker filter.
#[test_log::test(tokio::test)]
async fn test_e2e_server_rejects_unfiltered_upload() {
    let pinata = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "IpfsHash": "QmNope" })))
        .expect(0)
        .mount(&pinata)
        .await;

    let relay = RunningRelay::start(&pinata.uri()).await;

    crate::install_crypto_provider();
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"\x89PNG\r\n".to_vec())
            .file_name("cover.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = reqwest::Client::new()
        .post(relay.url.join("/api/upload").unwrap())
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 415);
    let body: crate::PinResult = response.json().await.unwrap();
    assert!(!body.success);
    assert!(body.error.is_some());

    assert_eq!(relay.scratch_entries(), 0);
    relay.stop().await;
}
