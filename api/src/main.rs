use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use affinity_core::{Engine, FavorabilityConfig};
use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
mod store;

/// How often idle per-person rate state is dropped.
const RATE_STATE_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Affinity API",
        version = "0.1.0",
        description = "Per-person favorability scoring for a conversational bot: classify each message, move the score within rate limits, and render a tone directive for the next reply."
    ),
    paths(
        routes::health::health_check,
        routes::events::ingest_event,
        routes::persons::get_favorability,
        routes::persons::tone_directive,
        routes::admin::list_favorability,
        routes::admin::set_favorability,
        routes::admin::favorability_stats,
    ),
    components(schemas(
        HealthResponse,
        affinity_core::error::ApiError,
        affinity_core::band::Band,
        affinity_core::classifier::Behavior,
        affinity_core::classifier::PositiveTier,
        affinity_core::classifier::EventPhase,
        affinity_core::classifier::ClassificationOutcome,
        affinity_core::rate_limit::SuppressReason,
        affinity_core::events::IngestEventRequest,
        affinity_core::events::Effect,
        affinity_core::events::EventReport,
        affinity_core::record::FavorabilitySummary,
        affinity_core::record::BandCount,
        affinity_core::record::FavorabilityStats,
        routes::persons::ToneRequest,
        routes::persons::ToneResponse,
        routes::admin::FavorabilityListResponse,
        routes::admin::SetScoreRequest,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub scoring_enabled: bool,
    /// Persons with live in-memory rate state
    pub tracked_persons: usize,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "affinity_api=debug,affinity_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = FavorabilityConfig::load();
    tracing::info!(
        enabled = config.enabled,
        inject_prompt = config.inject_prompt_enabled,
        reasoning_detection = config.reasoning_detection_enabled,
        timezone = %config.timezone,
        "favorability config loaded"
    );
    let engine = Arc::new(Engine::new(store::PgScoreStore::new(pool.clone()), config));

    let admin_token = state::AppState::admin_token_from_env();
    if admin_token.is_none() {
        tracing::warn!(
            "{} not set; /v1/admin/* answers 403",
            state::ADMIN_TOKEN_ENV
        );
    }

    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_STATE_SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = engine.sweep_rate_state(chrono::Utc::now()).await;
                if removed > 0 {
                    tracing::debug!(removed, "swept idle rate state");
                }
            }
        });
    }

    let app_state = state::AppState {
        db: pool,
        engine,
        admin_token,
    };

    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::events::router().layer(middleware::rate_limit::events_layer()))
        .merge(routes::persons::router().layer(middleware::rate_limit::persons_layer()))
        .merge(routes::admin::router().layer(middleware::rate_limit::admin_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Affinity API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
