//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `PINRELAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`, optional)
//! 2. **Environment variables** - Variables prefixed with `PINRELAY_` override YAML values
//! 3. **PINATA_JWT / PINATA_GATEWAY** - Special case: override `pinata.jwt` and `gateway_host`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `PINRELAY_UPLOADS__MAX_FILE_SIZE=1048576` sets the `uploads.max_file_size` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use pinrelay::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Pinning service credential (required)
//! PINATA_JWT="eyJhbGciOi..."
//!
//! # Gateway used to build public links
//! PINATA_GATEWAY="example.mypinata.cloud"
//!
//! # Override server port and scratch directory
//! PINRELAY_PORT=8080
//! PINRELAY_UPLOADS__SCRATCH_DIR=/var/tmp/pinrelay
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PINRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, except the pinning
/// credential which must be supplied before [`Config::validate`] passes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Public gateway host used to build `https://<host>/ipfs/<cid>` links. Bare host, no scheme.
    pub gateway_host: String,
    /// Remote pinning service connection
    pub pinata: PinataConfig,
    /// Upload staging and acceptance rules
    pub uploads: UploadsConfig,
    /// CORS settings for browser clients
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Pinning service (Pinata) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinataConfig {
    /// Base URL of the pinning API
    pub api_url: Url,
    /// JWT used as bearer credential. Usually supplied via `PINATA_JWT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    /// Optional per-request timeout. Unset means the relay call may take as long as it needs.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

/// Upload acceptance and staging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Directory holding staged uploads while they are relayed
    pub scratch_dir: PathBuf,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// MIME types the server accepts, checked independently of the client
    pub allowed_mime_types: Vec<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
}

/// One entry of `cors.allowed_origins`.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            gateway_host: "gateway.pinata.cloud".to_string(),
            pinata: PinataConfig::default(),
            uploads: UploadsConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("https://api.pinata.cloud").expect("static URL is valid"),
            jwt: None,
            request_timeout: None,
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("pinrelay"),
            max_file_size: 10 * 1024 * 1024, // 10 MiB
            allowed_mime_types: vec!["text/plain".to_string(), "application/pdf".to_string()],
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
        }
    }
}

/// Reasons a loaded configuration is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pinata.jwt is not configured. Set PINATA_JWT or add pinata.jwt to the config file.")]
    MissingCredential,
    #[error("gateway_host must be a bare host name (got '{0}')")]
    InvalidGatewayHost(String),
    #[error("uploads.max_file_size must be greater than zero")]
    ZeroMaxFileSize,
    #[error("uploads.allowed_mime_types cannot be empty")]
    NoAllowedMimeTypes,
    #[error("cors.allowed_origins cannot be empty. Add at least one allowed origin.")]
    NoAllowedOrigins,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("PINRELAY_").ignore(&["config"]).split("__"))
            // Conventional pinning service variables
            .merge(Env::raw().only(&["PINATA_JWT"]).map(|_| "pinata.jwt".into()))
            .merge(Env::raw().only(&["PINATA_GATEWAY"]).map(|_| "gateway_host".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pinata.jwt.as_deref().is_none_or(|jwt| jwt.trim().is_empty()) {
            return Err(ConfigError::MissingCredential);
        }

        let gateway = self.gateway_host.trim();
        if gateway.is_empty() || gateway.contains("://") || gateway.contains('/') {
            return Err(ConfigError::InvalidGatewayHost(self.gateway_host.clone()));
        }

        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::ZeroMaxFileSize);
        }

        if self.uploads.allowed_mime_types.is_empty() {
            return Err(ConfigError::NoAllowedMimeTypes);
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(ConfigError::NoAllowedOrigins);
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
