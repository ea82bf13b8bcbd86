use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tracing::{info, warn};
use zepchat_contracts::ChatRequest;

use crate::api::{ApiError, state::AppState};

// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    info!(
        question_len = request.question.len(),
        temperature = request.settings.temperature,
        relatedness = request.settings.relatedness,
        "Answering question"
    );

    let tokens = state.answers.answer(&request).await.map_err(|e| {
        warn!(error = %e, "Failed to start answer");
        ApiError::bad_gateway(e.to_string())
    })?;

    // An error item aborts the body mid-stream; the client sees a broken transfer.
    let body = Body::from_stream(tokens.inspect_err(|e| warn!(error = %e, "Answer stream failed")));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}
