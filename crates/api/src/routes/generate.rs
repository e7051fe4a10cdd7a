use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use diagram_common::GenerationOutcome;
use tracing::{info, instrument, warn};

use crate::{
    server::AppState,
    types::{ErrorResponse, GenerateRequest},
};

/// Generate a diagram and validate it against the caller's render client
///
/// Runs the full draft → validate → fix loop and answers once it settles.
/// A diagram that still fails to render after the retry budget is reported
/// with `success: false` and the last render error; it is not an HTTP error.
///
/// Pass the `connectionId` announced on the `/render` WebSocket to have the
/// diagram rendered by that client. Without it the first draft is returned
/// unvalidated.
#[utoipa::path(
    post,
    path = "/generate",
    tag = "generation",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generation finished (check `success`)", body = GenerationOutcome),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 422, description = "Missing or empty prompt", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn generate_diagram(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerationOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected generate request body");
        (
            rejection.status(),
            Json(ErrorResponse::new(rejection.body_text(), "INVALID_REQUEST_BODY")),
        )
    })?;

    if request.prompt.trim().is_empty() {
        warn!("Empty prompt provided");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(
                "Prompt cannot be empty. Please describe the diagram you want.",
                "EMPTY_PROMPT",
            )),
        ));
    }

    info!(
        prompt_preview = %request.prompt.chars().take(100).collect::<String>(),
        history_len = request.chat_history.len(),
        has_current_diagram = request.current_diagram.is_some(),
        connection_id = ?request.connection_id.as_ref().map(|id| id.as_str()),
        validate = request.validate,
        "Starting diagram generation"
    );

    let outcome = state.orchestrator.run(request.into_generation_request()).await;

    info!(
        success = outcome.success,
        attempts = outcome.attempts,
        validation = ?outcome.validation,
        "Diagram generation finished"
    );
    Ok(Json(outcome))
}
