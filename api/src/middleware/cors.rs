use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

pub const CORS_ORIGINS_ENV: &str = "AFFINITY_CORS_ORIGINS";

/// Parse a comma-separated origin list, skipping blanks and invalid values.
pub fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

/// CORS for browser dashboards, from `AFFINITY_CORS_ORIGINS`
/// (default `http://localhost:3000`).
pub fn build_cors_layer() -> CorsLayer {
    let raw =
        std::env::var(CORS_ORIGINS_ENV).unwrap_or_else(|_| "http://localhost:3000".to_string());

    CorsLayer::new()
        .allow_origin(parse_origins(&raw))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}
