use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::super::AppState;

pub async fn health_endpoint(State(state): State<AppState>) -> Response {
    let backend = state.client.endpoint().to_string();
    match state.client.ping(&state.model).await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "model": state.model,
            "backend": backend,
        }))
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unavailable",
                    "model": state.model,
                    "backend": backend,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
