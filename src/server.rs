use crate::server::shutdown::shutdown_signal;
use crate::server::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use std::error::Error;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod handler;
pub mod shutdown;
pub mod state;

pub async fn start_server(state: AppState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = state.configuration.clone();
    let router = create_router(state);

    let mut handles = Vec::new();
    for addr in (config.http.address.as_str(), config.http.port).to_socket_addrs()? {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| format!("Could not bind to {}: {}", addr, e))?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Serving undertow metrics on http://{}/metrics", local_addr);

        let router = router.clone();
        let handle = tokio::task::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
        });

        handles.push((local_addr, handle));
    }

    if handles.is_empty() {
        return Err(format!(
            "The bind address [{}:{}] did not resolve to any IP addresses",
            config.http.address, config.http.port
        )
        .into());
    }

    for (local_addr, handle) in handles {
        match handle.await {
            Ok(Ok(())) => tracing::info!(%local_addr, "Listener stopped"),
            Ok(Err(e)) => {
                return Err(format!("Listener on {} failed: {}", local_addr, e).into());
            }
            Err(e) => {
                return Err(format!("Listener task on {} panicked: {}", local_addr, e).into());
            }
        }
    }

    Ok(())
}

/// The request metrics layer is the outermost layer of the handler chain, so
/// it also sees timeouts and recovered panics.
pub fn create_router(state: AppState) -> Router {
    let metrics_layer = state.metrics_wrapper.layer();

    let router = Router::new()
        .route("/", get(handler::index))
        .route("/health", get(handler::health_check))
        .route("/metrics", get(handler::metrics))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            Duration::from_millis(state.configuration.http.timeout),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or("unknown"))
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(metrics_layer)
        .with_state(state);

    Router::new().fallback_service(NormalizePathLayer::trim_trailing_slash().layer(router))
}

#[cfg(test)]
mod tests {
    use crate::bootstrap::on_application_ready;
    use crate::config::Configuration;
    use crate::management::ManagementServer;
    use crate::request_metrics::MetricsHandlerWrapper;
    use crate::server::create_router;
    use crate::server::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use prometheus::Registry;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let configuration = Configuration::default();
        let registry = Registry::new();
        let metrics_wrapper = MetricsHandlerWrapper::new();

        on_application_ready(
            &configuration.metrics,
            &registry,
            &metrics_wrapper,
            Arc::new(ManagementServer::new()),
        )
        .unwrap();

        AppState {
            configuration: Arc::new(configuration),
            registry,
            metrics_wrapper,
        }
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let state = state();

        assert_eq!(StatusCode::OK, get(&state, "/health").await.0);
        assert_eq!(StatusCode::OK, get(&state, "/health/").await.0);

        let handler = state.metrics_wrapper.metrics_handler();
        assert_eq!(2, handler.total_requests());
        assert_eq!(0, handler.total_errors());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = state();
        get(&state, "/").await;

        let (status, body) = get(&state, "/metrics").await;
        assert_eq!(StatusCode::OK, status);
        assert!(body.contains("undertow_requests_milliseconds_count 1"));
        assert!(body.contains("undertow_request_errors_total 0"));
        assert!(body.contains(r#"undertow_worker_queue_size{worker="XNIO-1"} 0"#));
    }
}
