use axum::http::{HeaderValue, Response, StatusCode};
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

fn per_ip_layer(replenish_ms: u64, burst: u32, name: &str) -> RateLimitLayer {
    let config = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| panic!("invalid governor config for {name}"));
    GovernorLayer::new(config).error_handler(json_error_handler)
}

/// POST /v1/events: a chat relay posts every message, so 10 per second per IP.
pub fn events_layer() -> RateLimitLayer {
    per_ip_layer(100, 50, "events")
}

/// Person reads and tone directives: 120 requests/minute per IP.
pub fn persons_layer() -> RateLimitLayer {
    per_ip_layer(500, 30, "persons")
}

/// /v1/admin/*: 30 requests/minute per IP.
pub fn admin_layer() -> RateLimitLayer {
    per_ip_layer(2_000, 10, "admin")
}

/// JSON body in ApiError format, with Retry-After when the limiter knows it.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (code, None, msg.unwrap_or_default()),
    };

    let body = serde_json::json!({
        "error": affinity_core::error::codes::RATE_LIMITED,
        "message": message,
        "request_id": uuid::Uuid::now_v7().to_string(),
    });

    let mut response = Response::new(axum::body::Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(seconds) = retry_after {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    response
}
