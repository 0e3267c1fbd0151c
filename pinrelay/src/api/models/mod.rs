//! API request and response data models.
//!
//! - [`upload`]: Result of relaying a file to the pinning service, shared by the server handler
//!   and the upload client

pub mod upload;
