use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use super::super::AppState;
use super::super::error::ApiError;
use super::generate::IdeaRequest;
use crate::core::idea::Idea;

pub async fn process_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<IdeaRequest>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };
    let idea = match Idea::parse(&payload.idea) {
        Ok(idea) => idea,
        Err(e) => return ApiError::from(e).into_response(),
    };
    info!("[User Input] Idea: {}", idea);

    match state.chain.run(&idea).await {
        Ok(output) => Json(output).into_response(),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
