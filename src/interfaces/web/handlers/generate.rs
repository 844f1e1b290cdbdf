use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::header,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info};

use super::super::AppState;
use super::super::error::ApiError;
use crate::core::idea::Idea;

#[derive(Debug, Deserialize)]
pub struct IdeaRequest {
    #[serde(default)]
    pub idea: String,
}

pub async fn generate_post(
    State(state): State<AppState>,
    payload: Result<Json<IdeaRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => stream_generation(&state, &payload.idea),
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

pub async fn generate_get(
    State(state): State<AppState>,
    query: Result<Query<IdeaRequest>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(query)) => stream_generation(&state, &query.idea),
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

/// Validation happens before the stream opens, so a bad idea yields a plain
/// 400 and no events at all.
fn stream_generation(state: &AppState, raw_idea: &str) -> Response {
    let idea = match Idea::parse(raw_idea) {
        Ok(idea) => idea,
        Err(e) => return ApiError::from(e).into_response(),
    };
    info!("[User Input] Idea: {}", idea);

    // Dropping this stream on disconnect also drops the in-flight backend request.
    let events = state
        .pipeline
        .run(&idea)
        .map(|event| {
            debug!(kind = event.kind(), step = event.step().unwrap_or("-"), "SSE event");
            Event::default().json_data(event)
        });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
