//! HTTP request handlers for all API endpoints.
//!
//! # Handler Modules
//!
//! - [`health`]: Liveness probe
//! - [`upload`]: File upload relay to the pinning service
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the appropriate HTTP status code
//! and a `{success: false, error}` JSON body.

pub mod health;
pub mod upload;
