//! Extractors that turn axum rejections into structured `AppError` responses
//! instead of axum's plain-text defaults.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};

use crate::error::AppError;

const SCHEMA_HINT: &str = "Check the request against the endpoint's schema (GET /api-doc/openapi.json).";

/// Drop-in replacement for `axum::Json<T>` in handler signatures.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Drop-in replacement for `axum::extract::Query<T>`.
pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => {
                let body_text = rejection.body_text();
                Err(AppError::Validation {
                    message: format!("Invalid query string: {body_text}"),
                    field: Some(field_from_serde_message(&body_text).unwrap_or_else(|| "query".into())),
                    received: None,
                    docs_hint: Some(SCHEMA_HINT.to_string()),
                })
            }
        }
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field_from_serde_message(&body_text).unwrap_or_else(|| "body".into())),
        received: None,
        docs_hint: Some(SCHEMA_HINT.to_string()),
    }
}

/// Field named by serde's "missing field `x`" / "unknown field `x`" messages.
fn field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|marker| {
            let start = msg.find(marker)? + marker.len();
            let rest = &msg[start..];
            rest.find('`').map(|end| rest[..end].to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_missing_field_name() {
        let msg = "Failed to deserialize: missing field `text` at line 1 column 40";
        assert_eq!(field_from_serde_message(msg), Some("text".to_string()));
    }

    #[test]
    fn extracts_unknown_field_name() {
        let msg = "unknown field `mood`, expected one of `text`, `phase`";
        assert_eq!(field_from_serde_message(msg), Some("mood".to_string()));
    }

    #[test]
    fn variant_errors_have_no_field_hint() {
        let msg = "unknown variant `later`, expected `pre_response` or `post_response`";
        assert_eq!(field_from_serde_message(msg), None);
    }
}
