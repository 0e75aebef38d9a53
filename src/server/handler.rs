use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use prometheus::{Registry, TextEncoder};

pub async fn index() -> &'static str {
    "undertow-metrics"
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Every gather evaluates the registered meters against their live sources.
pub async fn metrics(State(registry): State<Registry>) -> impl IntoResponse {
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        ),

        Err(error) => {
            tracing::error!(?error, "Failed to encode the metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Failed to encode the metrics".to_owned(),
            )
        }
    }
}
