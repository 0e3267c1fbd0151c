//! Test utilities shared by handler, client and end-to-end tests.

use crate::config::{Config, PinataConfig, UploadsConfig};
use crate::pinning::{PinRequest, PinnedContent, PinningService};
use async_trait::async_trait;
use axum_test::TestServer;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Barrier;

/// Upload limit used by [`create_test_config`]
pub const TEST_MAX_FILE_SIZE: u64 = 1024;

pub fn pinata_config(api_url: &str) -> PinataConfig {
    crate::install_crypto_provider();
    PinataConfig {
        api_url: api_url.parse().expect("valid test URL"),
        jwt: Some("test-jwt".to_string()),
        request_timeout: None,
    }
}

pub fn create_test_config(scratch_dir: PathBuf) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        gateway_host: "gateway.test".to_string(),
        pinata: pinata_config("http://localhost:1"),
        uploads: UploadsConfig {
            scratch_dir,
            max_file_size: TEST_MAX_FILE_SIZE,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build a test server backed by `pinner`, staging into a fresh temporary directory.
pub async fn create_test_server(pinner: Arc<dyn PinningService>) -> (TestServer, TempDir) {
    let scratch = TempDir::new().expect("Failed to create scratch dir");
    let config = create_test_config(scratch.path().to_path_buf());

    let app = crate::Application::with_pinner(config, pinner)
        .await
        .expect("Failed to create application");

    (app.into_test_server(), scratch)
}

/// Number of entries currently in a scratch directory.
pub fn scratch_entries(scratch: &TempDir) -> usize {
    std::fs::read_dir(scratch.path()).map(|entries| entries.count()).unwrap_or(0)
}

/// One observed call to [`MockPinner`].
#[derive(Debug, Clone)]
pub struct PinCall {
    pub name: String,
    pub path: PathBuf,
    /// Bytes found at `path` when the call was made
    pub content: Vec<u8>,
}

/// In-memory pinning service that records what it was asked to pin.
pub struct MockPinner {
    outcome: Result<String, String>,
    rendezvous: Option<Barrier>,
    calls: Mutex<Vec<PinCall>>,
}

impl MockPinner {
    pub fn returning(cid: &str) -> Self {
        Self {
            outcome: Ok(cid.to_string()),
            rendezvous: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            rendezvous: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold every call until `n` calls are in flight at once.
    pub fn with_rendezvous(mut self, n: usize) -> Self {
        self.rendezvous = Some(Barrier::new(n));
        self
    }

    pub fn calls(&self) -> Vec<PinCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl PinningService for MockPinner {
    async fn pin_file(&self, request: PinRequest<'_>) -> anyhow::Result<PinnedContent> {
        let content = tokio::fs::read(request.path).await?;
        self.calls.lock().expect("mock lock poisoned").push(PinCall {
            name: request.name.to_string(),
            path: request.path.to_path_buf(),
            content,
        });

        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }

        match &self.outcome {
            Ok(cid) => Ok(PinnedContent {
                cid: cid.clone(),
                size: None,
                timestamp: None,
            }),
            Err(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }
}
