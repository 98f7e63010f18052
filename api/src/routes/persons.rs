use affinity_core::error::ApiError;
use affinity_core::record::FavorabilitySummary;
use affinity_core::tone::append_to_prompt;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/persons/{person_id}/favorability", get(get_favorability))
        .route("/v1/persons/{person_id}/tone", post(tone_directive))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToneRequest {
    /// Name to address the person by; defaults to a short id-based label
    #[serde(default)]
    pub display_name: Option<String>,
    /// The user's latest message, checked for goodwill
    #[serde(default)]
    pub last_text: String,
    /// Generation prompt to append the directive to
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToneResponse {
    pub person_id: String,
    /// Absent when prompt injection is switched off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    /// `prompt` with the directive appended, when a prompt was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

fn validate_person_id(person_id: &str) -> Result<&str, AppError> {
    let trimmed = person_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: "person_id must not be blank".to_string(),
            field: Some("person_id".to_string()),
            received: Some(serde_json::Value::String(person_id.to_string())),
            docs_hint: Some("Compute it with `affinity person-id <platform> <user_id>`.".to_string()),
        });
    }
    Ok(trimmed)
}

/// Current favorability of one person (created at 50 on first read)
#[utoipa::path(
    get,
    path = "/v1/persons/{person_id}/favorability",
    params(("person_id" = String, Path, description = "Hex SHA-256 person id")),
    responses(
        (status = 200, description = "Favorability summary", body = FavorabilitySummary),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "persons"
)]
pub async fn get_favorability(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
) -> Result<Json<FavorabilitySummary>, AppError> {
    let person_id = validate_person_id(&person_id)?;
    Ok(Json(state.engine.summary(person_id).await))
}

/// Relationship and tone directive for the next reply to this person
#[utoipa::path(
    post,
    path = "/v1/persons/{person_id}/tone",
    params(("person_id" = String, Path, description = "Hex SHA-256 person id")),
    request_body = ToneRequest,
    responses(
        (status = 200, description = "Tone directive", body = ToneResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "persons"
)]
pub async fn tone_directive(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
    AppJson(req): AppJson<ToneRequest>,
) -> Result<Json<ToneResponse>, AppError> {
    let person_id = validate_person_id(&person_id)?;
    let directive = state
        .engine
        .tone_directive(person_id, req.display_name.as_deref(), &req.last_text)
        .await;
    let prompt = match (&req.prompt, &directive) {
        (Some(prompt), Some(directive)) => Some(append_to_prompt(prompt, directive)),
        (Some(prompt), None) => Some(prompt.clone()),
        (None, _) => None,
    };
    Ok(Json(ToneResponse {
        person_id: person_id.to_string(),
        directive,
        prompt,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_person_id_is_rejected() {
        assert!(validate_person_id("   ").is_err());
        assert_eq!(validate_person_id(" abc ").unwrap(), "abc");
    }

    #[test]
    fn tone_request_fields_are_optional() {
        let req: ToneRequest = serde_json::from_str("{}").unwrap();
        assert!(req.display_name.is_none());
        assert!(req.last_text.is_empty());
        assert!(req.prompt.is_none());
    }
}
