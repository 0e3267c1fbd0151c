//! Command-line front end for the upload form.
//!
//! Start a relay first with:
//!   cargo run --bin pinrelay
//!
//! Then upload a file through it:
//!   cargo run --bin pinrelay-upload -- story.txt --title "The Lighthouse" --genre fiction

use anyhow::{Context, Result, bail};
use clap::Parser;
use pinrelay::client::{Genre, UploadController, UploadOutcome, UploadPhase};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Upload a .txt or .pdf file through a pinrelay server
#[derive(Parser, Debug)]
#[command(name = "pinrelay-upload")]
#[command(about = "Upload a text or PDF file to IPFS via a pinrelay server", long_about = None)]
struct Cli {
    /// File to upload
    file: PathBuf,

    /// Relay server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    server: Url,

    /// Public IPFS gateway host used for the result link
    #[arg(short, long, env = "PINATA_GATEWAY", default_value = "gateway.pinata.cloud")]
    gateway: String,

    /// Story title (kept locally, not uploaded)
    #[arg(long, default_value = "")]
    title: String,

    /// Story description (kept locally, not uploaded)
    #[arg(long, default_value = "")]
    description: String,

    /// Story genre (kept locally, not uploaded)
    #[arg(long, value_enum)]
    genre: Option<Genre>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    pinrelay::install_crypto_provider();

    let cli = Cli::parse();
    tracing::debug!("{:?}", cli);

    let mut controller = UploadController::new(&cli.server, cli.gateway)?;

    let details = controller.form_mut().details_mut();
    details.title = cli.title;
    details.description = cli.description;
    details.genre = cli.genre;

    let accepted = controller
        .select_path(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    if !accepted {
        let message = controller.form().state().error.clone().unwrap_or_default();
        bail!("{}", message);
    }

    match controller.submit().await {
        UploadPhase::Done(UploadOutcome::Success) => {
            let state = controller.form().state();
            println!("IPFS hash: {}", state.ipfs_hash.as_deref().unwrap_or_default());
            if let Some(url) = controller.gateway_url() {
                println!("View on gateway: {url}");
            }
            Ok(())
        }
        _ => {
            let message = controller.form().state().error.clone().unwrap_or_default();
            bail!("{}", message)
        }
    }
}
