//! # pinrelay: upload relay for content-addressed pinning
//!
//! `pinrelay` lets a user pick a local text or PDF file, upload it to a server endpoint, and have
//! that endpoint forward the bytes to a remote pinning service (Pinata), returning the resulting
//! content identifier (CID).
//!
//! ## Architecture
//!
//! The crate holds both halves of the upload pipeline.
//!
//! The **relay handler** ([`api::handlers::upload`]) is an [Axum](https://github.com/tokio-rs/axum)
//! route at `POST /api/upload`. It reads one multipart `file` part, validates it
//! ([`validation`]), stages it under a per-request token in a scratch directory ([`staging`]),
//! streams it to the pinning service ([`pinning`]) and answers with a [`PinResult`]. The staged
//! file is removed on every exit path.
//!
//! The **upload client** ([`client`]) models the browser form: file selection with MIME-type
//! filtering, a single outstanding upload, and the final success or failure display including
//! the public gateway link. The `pinrelay-upload` binary is a terminal front end for it.
//!
//! The pinning client is a capability: it is constructed once in [`Application::new`] and handed
//! to every request through [`AppState`], never torn down while the process runs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use pinrelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = pinrelay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     pinrelay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
mod openapi;
pub mod pinning;
pub mod staging;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::pinning::{PinataClient, PinningService};
use crate::staging::ScratchDir;
use crate::validation::UploadPolicy;
pub use api::models::upload::PinResult;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use url::Url;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Room left in the request body limit for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Install the process-wide rustls crypto provider used by outbound HTTP clients.
///
/// Safe to call repeatedly; only the first call installs anything.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Makes sure a url has a trailing slash.
///
/// Joining '/prefix' with 'path' gives '/path', but '/prefix/' with 'path' gives
/// '/prefix/path'. Call this before calling .join
pub(crate) fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// Application state shared across all request handlers.
///
/// - `config`: Application configuration loaded from environment/files
/// - `pinner`: Pinning service capability, shared by all requests
/// - `scratch`: Directory uploads are staged into
/// - `policy`: Server-side acceptance rules for uploads
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub pinner: Arc<dyn PinningService>,
    pub scratch: ScratchDir,
    pub policy: UploadPolicy,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST]))
}

/// Build the application router with all endpoints and middleware.
///
/// - `POST /api/upload` with a body limit derived from `uploads.max_file_size`
/// - `GET /healthz`
/// - `GET /docs` (OpenAPI UI)
/// - CORS and tracing layers
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = state.config.uploads.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let cors = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route(
            "/api/upload",
            post(api::handlers::upload::upload_file).layer(DefaultBodyLimit::max(usize::try_from(body_limit)?)),
        )
        .route("/healthz", get(api::handlers::health::healthz))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The relay server.
///
/// Lifecycle:
/// 1. **Create**: [`Application::new`] prepares the scratch directory and builds the pinning
///    client once from configuration
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish (and clean up
///    their staged files) before the server stops
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance backed by the configured Pinata account
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pinner = PinataClient::new(&config.pinata)?;
        Self::with_pinner(config, Arc::new(pinner)).await
    }

    /// Create a new application instance backed by an arbitrary pinning service
    pub async fn with_pinner(config: Config, pinner: Arc<dyn PinningService>) -> anyhow::Result<Self> {
        debug!("Starting pin relay with configuration: {:#?}", config);

        let scratch = ScratchDir::create(&config.uploads.scratch_dir).await?;
        let policy = UploadPolicy::new(&config.uploads);

        let app_state = AppState::builder()
            .config(config.clone())
            .pinner(pinner)
            .scratch(scratch)
            .policy(policy)
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Pin relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
