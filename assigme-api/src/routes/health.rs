use axum::Json;

use assigme_shared::types::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        "assigme-api",
        env!("CARGO_PKG_VERSION"),
    ))
}
