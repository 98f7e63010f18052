use affinity_core::error::ApiError;
use affinity_core::events::{EventReport, IngestEventRequest, SignalEvent};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

/// Longest message accepted for classification, in characters.
const MAX_TEXT_CHARS: usize = 8_000;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", post(ingest_event))
}

fn validate(req: IngestEventRequest) -> Result<SignalEvent, AppError> {
    let length = req.text.chars().count();
    if length > MAX_TEXT_CHARS {
        return Err(AppError::Validation {
            message: format!("text is {length} characters; the limit is {MAX_TEXT_CHARS}"),
            field: Some("text".to_string()),
            received: None,
            docs_hint: Some("Send the user's message only, not the whole transcript.".to_string()),
        });
    }

    req.into_signal_event().map_err(|err| AppError::Validation {
        message: err.to_string(),
        field: Some(err.field.to_string()),
        received: None,
        docs_hint: Some(
            "Send either person_id, or platform and user_id (the id is derived from both)."
                .to_string(),
        ),
    })
}

/// Classify one message and apply its effect to the sender's favorability.
///
/// Cooldowns and caps are not errors: a suppressed change is reported in
/// `effect` with status 200.
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = IngestEventRequest,
    responses(
        (status = 200, description = "Event classified and scored", body = EventReport),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "events"
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    AppJson(req): AppJson<IngestEventRequest>,
) -> Result<Json<EventReport>, AppError> {
    let event = validate(req)?;
    let report = state.engine.handle_event(&event).await;
    Ok(Json(report))
}
