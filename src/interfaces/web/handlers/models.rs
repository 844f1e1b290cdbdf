use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::super::error::ApiError;

pub async fn list_models_endpoint(State(state): State<AppState>) -> Response {
    match state.client.list_models().await {
        Ok(models) => Json(serde_json::json!({
            "active": state.model,
            "models": models,
        }))
        .into_response(),
        Err(e) => ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
