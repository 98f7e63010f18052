use affinity_core::error::ApiError;
use affinity_core::record::{FavorabilityStats, FavorabilitySummary};
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AdminAuth;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/favorability", get(list_favorability))
        .route("/v1/admin/favorability/stats", get(favorability_stats))
        .route("/v1/admin/favorability/{person_id}", put(set_favorability))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Only persons whose id contains this fragment
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavorabilityListResponse {
    pub total: usize,
    /// Highest score first
    pub persons: Vec<FavorabilitySummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetScoreRequest {
    /// New score; clamped into [-50, 150]
    pub score: i64,
}

/// List every stored person, or search by person id fragment
#[utoipa::path(
    get,
    path = "/v1/admin/favorability",
    params(ListParams),
    responses(
        (status = 200, description = "Stored favorability records", body = FavorabilityListResponse),
        (status = 401, description = "Missing or invalid admin token", body = ApiError),
        (status = 403, description = "Admin routes disabled", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_favorability(
    _admin: AdminAuth,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<FavorabilityListResponse>, AppError> {
    let persons = match params.search.as_deref().map(str::trim) {
        Some(fragment) if !fragment.is_empty() => state.engine.search(fragment).await?,
        _ => state.engine.list_records().await?,
    };
    Ok(Json(FavorabilityListResponse {
        total: persons.len(),
        persons,
    }))
}

/// Overwrite one person's score
#[utoipa::path(
    put,
    path = "/v1/admin/favorability/{person_id}",
    params(("person_id" = String, Path, description = "Hex SHA-256 person id")),
    request_body = SetScoreRequest,
    responses(
        (status = 200, description = "Updated record", body = FavorabilitySummary),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Missing or invalid admin token", body = ApiError),
        (status = 403, description = "Admin routes disabled", body = ApiError),
        (status = 500, description = "Store failure", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn set_favorability(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(person_id): Path<String>,
    AppJson(req): AppJson<SetScoreRequest>,
) -> Result<Json<FavorabilitySummary>, AppError> {
    let person_id = person_id.trim();
    if person_id.is_empty() {
        return Err(AppError::Validation {
            message: "person_id must not be blank".to_string(),
            field: Some("person_id".to_string()),
            received: None,
            docs_hint: None,
        });
    }
    let summary = state.engine.set_score(person_id, req.score).await?;
    Ok(Json(summary))
}

/// Count per band and mean score
#[utoipa::path(
    get,
    path = "/v1/admin/favorability/stats",
    responses(
        (status = 200, description = "Favorability statistics", body = FavorabilityStats),
        (status = 401, description = "Missing or invalid admin token", body = ApiError),
        (status = 403, description = "Admin routes disabled", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn favorability_stats(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<FavorabilityStats>, AppError> {
    Ok(Json(state.engine.stats().await?))
}
