/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    summary = "Liveness probe",
    responses(
        (status = 200, description = "Server is accepting requests", body = String)
    )
)]
pub async fn healthz() -> &'static str {
    "OK"
}
