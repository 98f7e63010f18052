use affinity_core::identity::token_matches;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::{ADMIN_TOKEN_ENV, AppState};

/// Proof that the request carried the configured admin bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
            docs_hint: Some("Include 'Authorization: Bearer <admin token>' header.".to_string()),
        })?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use Bearer scheme".to_string(),
            docs_hint: Some("Format: 'Authorization: Bearer <token>'".to_string()),
        })
}

/// Check a request's credentials against the configured admin token.
pub fn authorize_admin(parts: &Parts, expected: Option<&str>) -> Result<AdminAuth, AppError> {
    let Some(expected) = expected else {
        return Err(AppError::Forbidden {
            message: "Admin routes are disabled".to_string(),
            docs_hint: Some(format!(
                "Set {ADMIN_TOKEN_ENV} on the server to enable /v1/admin/*."
            )),
        });
    };

    let presented = bearer_token(parts)?;
    if token_matches(presented, expected) {
        Ok(AdminAuth)
    } else {
        tracing::warn!("admin request with invalid token rejected");
        Err(AppError::Unauthorized {
            message: "Invalid admin token".to_string(),
            docs_hint: Some(format!("Use the value of {ADMIN_TOKEN_ENV}.")),
        })
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize_admin(parts, state.admin_token.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/admin/favorability");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn disabled_admin_is_forbidden() {
        let result = authorize_admin(&parts(Some("Bearer anything")), None);
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(
            authorize_admin(&parts(None), Some("s3cret")),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(matches!(
            authorize_admin(&parts(Some("Basic s3cret")), Some("s3cret")),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn matching_token_is_accepted() {
        assert!(authorize_admin(&parts(Some("Bearer s3cret")), Some("s3cret")).is_ok());
        assert!(matches!(
            authorize_admin(&parts(Some("Bearer wrong")), Some("s3cret")),
            Err(AppError::Unauthorized { .. })
        ));
    }
}
