//! OpenAPI documentation for the relay API, served at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pinrelay",
        description = "Relay text and PDF uploads to a content-addressed pinning service."
    ),
    paths(api::handlers::upload::upload_file, api::handlers::health::healthz),
    components(schemas(api::models::upload::PinResult)),
    tags(
        (name = "upload", description = "File upload and pinning"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
