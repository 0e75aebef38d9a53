use crate::config::Configuration;
use crate::request_metrics::MetricsHandlerWrapper;
use axum::extract::FromRef;
use prometheus::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub configuration: Arc<Configuration>,
    pub registry: Registry,
    pub metrics_wrapper: MetricsHandlerWrapper,
}

impl FromRef<AppState> for Registry {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}
